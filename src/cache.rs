//! Thread-local cache of compiled ast-grep patterns.
//!
//! Extract-constant searches every file of a package (or the whole
//! workspace) with the same literal pattern, so compiled patterns are
//! memoized per thread. The cache holds at most 256 entries and is flushed
//! wholesale when full.

use ast_grep_core::Pattern;
use ast_grep_language::SupportLang;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    // "<lang>:<pattern>" so one pattern string compiled for two grammars never collides.
    static PATTERN_CACHE: RefCell<HashMap<String, Pattern>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled pattern from cache, or compile and cache it.
pub fn get_or_compile_pattern(pattern_str: &str, lang: SupportLang) -> Pattern {
    let cache_key = format!("{lang:?}:{pattern_str}");

    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(p) = cache.get(&cache_key) {
            return p.clone();
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Pattern::new(pattern_str, lang);
        cache.insert(cache_key, compiled.clone());
        compiled
    })
}

/// Drop every cached pattern.
pub fn clear_cache() {
    PATTERN_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

/// Number of cached patterns on this thread.
pub fn cache_size() -> usize {
    PATTERN_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_patterns_hit_cache() {
        clear_cache();
        get_or_compile_pattern("\"hello\"", SupportLang::Go);
        get_or_compile_pattern("\"hello\"", SupportLang::Go);
        assert_eq!(cache_size(), 1);
        get_or_compile_pattern("42", SupportLang::Go);
        assert_eq!(cache_size(), 2);
        clear_cache();
        assert_eq!(cache_size(), 0);
    }
}
