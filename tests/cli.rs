//! CLI tests: run the built binary against temporary Go modules.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const A: &str = "package a\n\nfunc Foo() int { return 1 }\n";
const B: &str = "package b\n\nimport \"example.com/m/a\"\n\nfunc Use() int {\n\treturn a.Foo()\n}\n";

fn setup_module() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("go.mod"), "module example.com/m\n\ngo 1.22\n").unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    fs::write(dir.path().join("a/a.go"), A).unwrap();
    fs::write(dir.path().join("b/b.go"), B).unwrap();
    dir
}

fn gorefactor(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gorefactor"))
        .arg("--workspace")
        .arg(workspace)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const RENAME: &[&str] = &[
    "rename-symbol",
    "--package",
    "a",
    "--symbol",
    "Foo",
    "--new-name",
    "Bar",
    "--scope",
    "workspace",
];

#[test]
fn help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_gorefactor"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    for command in [
        "rename-symbol",
        "change-signature",
        "convert-to-aliases",
        "move-by-dependencies",
        "batch",
        "references",
    ] {
        assert!(text.contains(command), "help lacks {command}");
    }
}

#[test]
fn dry_run_previews_without_writing() {
    let dir = setup_module();
    let mut args = RENAME.to_vec();
    args.push("--dry-run");
    let output = gorefactor(dir.path(), &args);

    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("2 change(s) in 2 file(s)"));
    assert!(text.contains("a/a.go:3:6  \"Foo\" → \"Bar\""));
    assert!(text.contains("DRY RUN"));
    assert_eq!(fs::read_to_string(dir.path().join("a/a.go")).unwrap(), A);
}

#[test]
fn diff_shows_rewritten_lines() {
    let dir = setup_module();
    let mut args = RENAME.to_vec();
    args.extend(["--dry-run", "--diff"]);
    let output = gorefactor(dir.path(), &args);

    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("-func Foo() int { return 1 }"));
    assert!(text.contains("+func Bar() int { return 1 }"));
    assert!(text.contains("+\treturn a.Bar()"));
}

#[test]
fn apply_rewrites_files() {
    let dir = setup_module();
    let output = gorefactor(dir.path(), RENAME);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Summary:"));
    assert_eq!(
        fs::read_to_string(dir.path().join("a/a.go")).unwrap(),
        "package a\n\nfunc Bar() int { return 1 }\n"
    );
    assert!(fs::read_to_string(dir.path().join("b/b.go"))
        .unwrap()
        .contains("a.Bar()"));
}

#[test]
fn unknown_symbol_is_a_validation_error() {
    let dir = setup_module();
    let output = gorefactor(
        dir.path(),
        &["rename-symbol", "--package", "a", "--symbol", "Nope", "--new-name", "X"],
    );
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("symbol 'Nope' not found"));
    assert!(err.contains("Foo"));
}

#[test]
fn illegal_identifier_is_a_validation_error() {
    let dir = setup_module();
    let output = gorefactor(
        dir.path(),
        &["rename-symbol", "--package", "a", "--symbol", "Foo", "--new-name", "1x"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read_to_string(dir.path().join("a/a.go")).unwrap(), A);
}

#[test]
fn saved_plan_runs_through_batch() {
    let dir = setup_module();
    let plan_file = dir.path().join("rename.json");
    let mut args = RENAME.to_vec();
    let plan_arg = plan_file.to_string_lossy().into_owned();
    args.extend(["--dry-run", "--save-plan", &plan_arg]);
    let output = gorefactor(dir.path(), &args);
    assert!(output.status.success(), "{}", stderr(&output));

    let saved = fs::read_to_string(&plan_file).unwrap();
    assert!(saved.contains("\"version\": \"1.0\""));
    assert!(saved.contains("rename_symbol"));

    // Saved as a dry run, so replaying only previews.
    let output = gorefactor(dir.path(), &["batch", "--plan", &plan_arg]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("DRY RUN"));
    assert_eq!(fs::read_to_string(dir.path().join("a/a.go")).unwrap(), A);

    fs::write(&plan_file, saved.replace("\"dry_run\": true", "\"dry_run\": false")).unwrap();
    let output = gorefactor(dir.path(), &["batch", "--plan", &plan_arg]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(fs::read_to_string(dir.path().join("a/a.go"))
        .unwrap()
        .contains("func Bar()"));
}

#[test]
fn malformed_plan_document_is_rejected() {
    let dir = setup_module();
    let plan_file = dir.path().join("bad.json");
    fs::write(
        &plan_file,
        r#"{"version":"2.0","created_at":"2024-05-01T10:00:00Z","workspace":".","steps":[]}"#,
    )
    .unwrap();
    let output = gorefactor(dir.path(), &["batch", "--plan", &plan_file.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("2.0"));

    let missing = dir.path().join("missing.json");
    let output = gorefactor(dir.path(), &["batch", "--plan", &missing.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn references_lists_every_site() {
    let dir = setup_module();
    let output = gorefactor(
        dir.path(),
        &["references", "Foo", "--package", "a", "--with-definition"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("a/a.go:3:6  definition"));
    assert!(text.contains("b/b.go:6:11  reference"));
    assert!(text.contains("2 reference(s) to Foo"));
}

#[test]
fn config_errors_map_to_exit_codes() {
    let dir = setup_module();
    fs::write(dir.path().join(".gorefactor.toml"), "[aliases]\nlength = 0\n").unwrap();
    let output = gorefactor(dir.path(), &["clean-aliases", "--dry-run"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("aliases.length"));

    let missing = dir.path().join("nope.toml");
    let output = gorefactor(
        dir.path(),
        &["--config", &missing.to_string_lossy(), "clean-aliases"],
    );
    assert_eq!(output.status.code(), Some(3));
}
