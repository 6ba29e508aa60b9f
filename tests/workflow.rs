//! End-to-end workflow against modules on disk:
//! load, plan, validate, apply, then reload and check the bytes.

use gorefactor::config;
use gorefactor::ops::{Context, MoveSymbol, RenameInterfaceMethod, RenameSymbol, Scope};
use gorefactor::plan::{apply, render_preview, validate_plan, BatchComposer, PlanDocument};
use gorefactor::{load, AnyOperation, IssueKind, LoadOptions, Plan, ReferenceIndex, Workspace};
use std::fs;
use tempfile::TempDir;

const A: &str = "package a\n\nfunc Foo() int { return 1 }\n";
const B: &str = "package b\n\nimport \"example.com/m/a\"\n\nfunc Use() int {\n\treturn a.Foo()\n}\n";

/// Module `example.com/m` with the given files.
fn module(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("go.mod"), "module example.com/m\n\ngo 1.22\n").unwrap();
    for (path, text) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, text).unwrap();
    }
    dir
}

fn read(dir: &TempDir, path: &str) -> String {
    fs::read_to_string(dir.path().join(path)).unwrap()
}

fn load_module(dir: &TempDir) -> Workspace {
    load(dir.path(), &LoadOptions::default()).unwrap()
}

fn plan(ws: &Workspace, op: impl Into<AnyOperation>) -> Plan {
    let index = ReferenceIndex::build(ws);
    let cx = Context::new(ws, &index);
    op.into().plan(&cx).unwrap()
}

fn rename(name: &str, new_name: &str) -> RenameSymbol {
    RenameSymbol {
        package: Some("a".into()),
        name: name.into(),
        new_name: new_name.into(),
        scope: Scope::Workspace,
    }
}

#[test]
fn rename_across_packages_and_back() {
    let dir = module(&[("a/a.go", A), ("b/b.go", B)]);
    let ws = load_module(&dir);

    let p = plan(&ws, rename("Foo", "Bar"));
    assert_eq!(p.changes.len(), 2);
    assert!(p.changes.iter().all(|c| c.new_text == "Bar"));
    assert!(validate_plan(&p, &ws, false).is_ok());

    let summary = apply(&p, &ws).unwrap();
    assert_eq!(summary.edited.len(), 2);
    assert_eq!(read(&dir, "a/a.go"), "package a\n\nfunc Bar() int { return 1 }\n");
    assert!(read(&dir, "b/b.go").contains("\treturn a.Bar()\n"));

    let renamed = load_module(&dir);
    let back = plan(&renamed, rename("Bar", "Foo"));
    apply(&back, &renamed).unwrap();
    assert_eq!(read(&dir, "a/a.go"), A);
    assert_eq!(read(&dir, "b/b.go"), B);
}

#[test]
fn move_symbol_materializes_target_package() {
    let src = "package src\n\nfunc Helper() {}\n\nfunc Other() {}\n";
    let app = "package app\n\nimport \"example.com/m/src\"\n\nfunc Run() {\n\tsrc.Helper()\n\tsrc.Other()\n}\n";
    let dir = module(&[("src/src.go", src), ("app/app.go", app)]);
    let ws = load_module(&dir);

    let p = plan(
        &ws,
        MoveSymbol {
            symbol: "Helper".into(),
            from_package: "src".into(),
            to_package: "util".into(),
            create_target: true,
        },
    );
    assert!(validate_plan(&p, &ws, false).is_ok());
    let summary = apply(&p, &ws).unwrap();
    assert_eq!(summary.created.len(), 1);

    assert_eq!(read(&dir, "util/util.go"), "package util\n\nfunc Helper() {}\n");
    assert_eq!(read(&dir, "src/src.go"), "package src\n\nfunc Other() {}\n");
    let app = read(&dir, "app/app.go");
    assert!(app.contains("\tutil.Helper()\n"));
    assert!(app.contains("\"example.com/m/util\""));

    let moved = load_module(&dir);
    assert!(moved.find_package("util").is_some());
}

#[test]
fn interface_method_rename_updates_implementations() {
    let io = "package io\n\ntype Reader interface {\n\tRead(p []byte) (int, error)\n}\n\ntype F struct{}\n\nfunc (f *F) Read(p []byte) (int, error) { return 0, nil }\n";
    let usage = "package io\n\nfunc Use(buf []byte) {\n\tf := &F{}\n\tf.Read(buf)\n}\n";
    let dir = module(&[("io/io.go", io), ("io/use.go", usage)]);
    let ws = load_module(&dir);

    let p = plan(
        &ws,
        RenameInterfaceMethod {
            package: Some("io".into()),
            interface: "Reader".into(),
            method: "Read".into(),
            new_name: "ReadBytes".into(),
        },
    );
    assert_eq!(p.changes.len(), 3);
    apply(&p, &ws).unwrap();

    let io = read(&dir, "io/io.go");
    assert!(io.contains("\tReadBytes(p []byte) (int, error)\n"));
    assert!(io.contains("func (f *F) ReadBytes(p []byte)"));
    assert!(read(&dir, "io/use.go").contains("\tf.ReadBytes(buf)\n"));
}

#[test]
fn conflicting_batch_steps() {
    let dir = module(&[("a/a.go", A), ("b/b.go", B)]);
    let ws = load_module(&dir);
    let steps: Vec<AnyOperation> = vec![rename("Foo", "Bar").into(), rename("Foo", "Baz").into()];

    let err = BatchComposer::new(&ws).compose(&steps).unwrap_err();
    assert_eq!(err.kind(), IssueKind::InvalidOperation);
    assert!(err.to_string().contains("overlapping changes in"));
    assert_eq!(read(&dir, "a/a.go"), A);

    let p = BatchComposer::new(&ws).atomic(false).compose(&steps).unwrap();
    assert!(p
        .issues()
        .iter()
        .any(|i| i.message.contains("dropped") && !i.is_error()));
    apply(&p, &ws).unwrap();
    assert!(read(&dir, "a/a.go").contains("func Bar()"));
    assert!(read(&dir, "b/b.go").contains("a.Bar()"));
}

#[test]
fn persisted_plan_runs_after_reload() {
    let dir = module(&[("a/a.go", A), ("b/b.go", B)]);
    let plan_file = dir.path().join("rename.plan.json");

    let doc = PlanDocument::from_operations(dir.path(), &[rename("Foo", "Bar").into()], false)
        .unwrap();
    doc.save(&plan_file).unwrap();

    let text = fs::read_to_string(&plan_file).unwrap();
    assert!(text.contains("\"type\": \"rename_symbol\""));
    assert!(text.contains("\"symbol\": \"Foo\""));

    let loaded = PlanDocument::load(&plan_file).unwrap();
    assert_eq!(loaded, doc);
    assert!(loaded.created_at().is_ok());
    let ops = loaded.operations().unwrap();

    let ws = load_module(&dir);
    let p = BatchComposer::new(&ws).compose(&ops).unwrap();
    assert!(render_preview(&p, &ws).contains("\"Foo\" → \"Bar\""));
    apply(&p, &ws).unwrap();
    assert!(read(&dir, "a/a.go").contains("func Bar()"));
}

#[test]
fn stale_file_is_refused() {
    let dir = module(&[("a/a.go", A), ("b/b.go", B)]);
    let ws = load_module(&dir);
    let p = plan(&ws, rename("Foo", "Bar"));

    let edited = "package a\n\n// edited meanwhile\nfunc Foo() int { return 2 }\n";
    fs::write(dir.path().join("a/a.go"), edited).unwrap();

    let err = apply(&p, &ws).unwrap_err();
    assert_eq!(err.kind(), IssueKind::FilesystemError);
    assert_eq!(read(&dir, "a/a.go"), edited);
}

#[test]
fn config_excludes_directories_from_the_load() {
    let dir = module(&[
        ("a/a.go", A),
        ("gen/gen.go", "package gen\n\nfunc Generated() {}\n"),
    ]);
    fs::write(
        dir.path().join(config::CONFIG_FILE_NAME),
        "[workspace]\nexclude = [\"gen\"]\n\n[planner]\natomic = false\n",
    )
    .unwrap();

    let cfg = config::load_for_workspace(dir.path(), None).unwrap();
    assert!(!cfg.planner.atomic);
    let ws = load(dir.path(), &cfg.load_options()).unwrap();
    assert!(ws.find_package("a").is_some());
    assert!(ws.find_package("gen").is_none());
}
