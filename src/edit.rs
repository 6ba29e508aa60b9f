use crate::plan::Change;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The write primitive under the plan writer: byte-span replacement with
/// verification of the text being replaced.
///
/// Every plan compiles down to edits. Each one names the bytes it expects
/// to find, so a file that changed after planning is refused instead of
/// being corrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    /// Absolute path of the file to edit
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    pub new_text: String,
    /// What the span must hold before the edit
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (large spans such as moved declarations)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Exact match for short spans, a hash above 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    fn describe(&self) -> String {
        match self {
            EditVerification::ExactMatch(text) => format!("{text:?}"),
            EditVerification::Hash(h) => format!("text with xxh3 {h:016x}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at {}:{byte_start}: expected {expected}, found {found:?}", file.display())]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("invalid byte range [{byte_start}, {byte_end}) in {} of length {file_len}", file.display())]
    InvalidByteRange {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("overlapping edits in {} at {first:?} and {second:?}", file.display())]
    Overlap {
        file: PathBuf,
        first: (usize, usize),
        second: (usize, usize),
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("edit in {} would create malformed UTF-8", file.display())]
    InvalidUtf8Edit { file: PathBuf },
}

impl EditError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        EditError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of applying the edits of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    Applied {
        file: PathBuf,
        edits: usize,
        bytes_before: usize,
        bytes_after: usize,
    },
    /// Every span already held its new text
    AlreadyApplied { file: PathBuf },
}

impl Edit {
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Edit of `root.join(change.file)` expecting `expected` in the span.
    pub fn from_change(root: &Path, change: &Change, expected: &str) -> Self {
        Self::new(
            root.join(&change.file),
            change.start,
            change.end,
            change.new_text.clone(),
            expected,
        )
    }

    /// Check the span against `content`; `Ok(true)` when it already holds
    /// the new text.
    fn verify(&self, content: &str) -> Result<bool, EditError> {
        let current = (self.byte_start <= self.byte_end)
            .then(|| content.get(self.byte_start..self.byte_end))
            .flatten()
            .ok_or_else(|| EditError::InvalidByteRange {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            })?;
        if self.expected_before.matches(current) {
            return Ok(false);
        }
        if current == self.new_text {
            return Ok(true);
        }
        Err(EditError::BeforeTextMismatch {
            file: self.file.clone(),
            byte_start: self.byte_start,
            byte_end: self.byte_end,
            expected: self.expected_before.describe(),
            found: current.to_string(),
        })
    }
}

/// Apply `edits` (all for one file) to `content` in memory.
///
/// Edits are applied bottom-to-top so earlier offsets stay valid; an
/// insertion sharing its offset with a replacement lands before the
/// replaced text. Returns the new text and whether anything changed.
pub fn splice(content: &str, edits: &[Edit]) -> Result<(String, bool), EditError> {
    let mut ordered: Vec<&Edit> = edits.iter().collect();
    ordered.sort_by(|a, b| {
        b.byte_start
            .cmp(&a.byte_start)
            .then(b.byte_end.cmp(&a.byte_end))
    });

    for pair in ordered.windows(2) {
        let (later, earlier) = (pair[0], pair[1]);
        let clash = if earlier.byte_start == earlier.byte_end && later.byte_start == later.byte_end {
            earlier.byte_start == later.byte_start
        } else {
            earlier.byte_end > later.byte_start
        };
        if clash {
            return Err(EditError::Overlap {
                file: later.file.clone(),
                first: (earlier.byte_start, earlier.byte_end),
                second: (later.byte_start, later.byte_end),
            });
        }
    }

    let mut out = content.to_string();
    let mut changed = false;
    for edit in ordered {
        if edit.verify(content)? {
            continue;
        }
        out.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
        changed = true;
    }
    Ok((out, changed))
}

/// Apply edits grouped per file, one atomic write per file.
pub fn apply_batch(mut edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
    edits.sort_by(|a, b| a.file.cmp(&b.file));
    let mut results = Vec::new();
    for group in edits.chunk_by(|a, b| a.file == b.file) {
        results.push(apply_file_edits(group)?);
    }
    Ok(results)
}

fn apply_file_edits(edits: &[Edit]) -> Result<EditResult, EditError> {
    let file = &edits[0].file;
    let bytes = fs::read(file).map_err(|e| EditError::io(file, e))?;
    let original = String::from_utf8(bytes).map_err(|_| EditError::InvalidUtf8Edit {
        file: file.clone(),
    })?;
    let (updated, changed) = splice(&original, edits)?;
    if !changed {
        return Ok(EditResult::AlreadyApplied { file: file.clone() });
    }
    atomic_write(file, updated.as_bytes())?;

    // Bump mtime so go build caches and editors notice the rewrite.
    filetime::set_file_mtime(file, filetime::FileTime::now())
        .map_err(|e| EditError::io(file, e))?;

    Ok(EditResult::Applied {
        file: file.clone(),
        edits: edits.len(),
        bytes_before: original.len(),
        bytes_after: updated.len(),
    })
}

/// Atomic file write: tempfile + fsync + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory"),
        )
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| EditError::io(path, e))?;
    temp.write_all(content).map_err(|e| EditError::io(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| EditError::io(path, e))?;
    temp.persist(path).map_err(|e| EditError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_exact_and_hash() {
        let verify = EditVerification::ExactMatch("func Foo".into());
        assert!(verify.matches("func Foo"));
        assert!(!verify.matches("func"));

        let body = "x".repeat(2000);
        let hashed = EditVerification::from_text(&body);
        assert!(matches!(hashed, EditVerification::Hash(_)));
        assert!(hashed.matches(&body));
        assert!(!hashed.matches("x"));
    }

    #[test]
    fn splice_applies_bottom_up() {
        let src = "package a\n\nfunc Foo() { Foo() }\n";
        let edits = vec![
            Edit::new("a.go", 16, 19, "Bar", "Foo"),
            Edit::new("a.go", 24, 27, "Bar", "Foo"),
            Edit::new("a.go", src.len(), src.len(), "\nvar X = 1\n", ""),
        ];
        let (out, changed) = splice(src, &edits).unwrap();
        assert!(changed);
        assert_eq!(out, "package a\n\nfunc Bar() { Bar() }\n\nvar X = 1\n");
    }

    #[test]
    fn insertion_lands_before_replacement_at_same_offset() {
        let (out, _) = splice(
            "ab",
            &[
                Edit::new("f.go", 0, 1, "A", "a"),
                Edit::new("f.go", 0, 0, "<", ""),
            ],
        )
        .unwrap();
        assert_eq!(out, "<Ab");
    }

    #[test]
    fn splice_rejects_stale_and_bad_ranges() {
        let err = splice("hello", &[Edit::new("f.go", 0, 5, "bye", "world")]).unwrap_err();
        assert!(matches!(err, EditError::BeforeTextMismatch { .. }));

        let err = splice("hello", &[Edit::new("f.go", 3, 9, "x", "")]).unwrap_err();
        assert!(matches!(err, EditError::InvalidByteRange { .. }));

        let err = splice(
            "hello",
            &[Edit::new("f.go", 0, 3, "x", "hel"), Edit::new("f.go", 2, 4, "y", "ll")],
        )
        .unwrap_err();
        assert!(matches!(err, EditError::Overlap { .. }));
    }

    #[test]
    fn already_applied_edits_are_skipped() {
        let (out, changed) = splice("Bar()", &[Edit::new("f.go", 0, 3, "Bar", "Foo")]).unwrap();
        assert!(!changed);
        assert_eq!(out, "Bar()");
    }

    #[test]
    fn batch_writes_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        let b = dir.path().join("b.go");
        fs::write(&a, "package a\n\nvar Foo = 1\n").unwrap();
        fs::write(&b, "package b\n").unwrap();

        let results = apply_batch(vec![
            Edit::new(&a, 15, 18, "Bar", "Foo"),
            Edit::new(&b, 8, 9, "c", "b"),
            Edit::new(&a, 8, 9, "z", "a"),
        ])
        .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(fs::read_to_string(&a).unwrap(), "package z\n\nvar Bar = 1\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "package c\n");

        let again = apply_batch(vec![Edit::new(&b, 8, 9, "c", "b")]).unwrap();
        assert!(matches!(again[0], EditResult::AlreadyApplied { .. }));
    }
}
