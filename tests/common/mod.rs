//! Shared harness: writes multi-file Nyla projects to a temp directory,
//! compiles them through the full pipeline, and runs the lowered module on
//! the evaluating backend.

use nylac::backends::interp::Machine;
use nylac::backends::ir::IrModuleBackend;
use nylac::compiler::compiler_errors::ErrorKind;
use nylac::compiler::orchestrator::{COMPFLAGS_FULL_COMPILATION, Compilation, CompileOptions};
use std::fs;
use tempfile::TempDir;

pub struct BuiltProject {
    // Keeps the source tree alive for error-snippet reads
    #[allow(dead_code)]
    pub dir: TempDir,
    pub compilation: Compilation<IrModuleBackend>,
    pub ok: bool,
}

/// Compiles a project given as `(internal_path, source)` pairs.
pub fn build_project(files: &[(&str, &str)], main_path: &str) -> BuiltProject {
    let dir = tempfile::tempdir().expect("temp dir");
    for (path, source) in files {
        let full = dir.path().join(format!("{path}.nyla"));
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("source dirs");
        }
        fs::write(full, source).expect("source file");
    }

    let options = CompileOptions {
        flags: COMPFLAGS_FULL_COMPILATION,
        executable_name: "program".to_string(),
        main_path: main_path.to_string(),
    };
    let mut compilation = Compilation::new(IrModuleBackend::new(), options);
    let ok = compilation.compile(&[dir.path().to_path_buf()]);

    BuiltProject {
        dir,
        compilation,
        ok,
    }
}

/// Compiles and executes a project, returning `main`'s exit code.
pub fn run_project(files: &[(&str, &str)], main_path: &str) -> i32 {
    let project = build_project(files, main_path);
    assert!(
        project.ok,
        "compilation failed: {:#?}",
        project.compilation.all_errors()
    );

    let module = &project.compilation.backend().module;
    let mut machine = Machine::new(module).expect("machine setup");
    machine.run_main().expect("execution")
}

/// Compiles a project expected to fail and returns the diagnostic kinds.
pub fn expect_errors(files: &[(&str, &str)], main_path: &str) -> Vec<ErrorKind> {
    let project = build_project(files, main_path);
    assert!(!project.ok, "compilation unexpectedly succeeded");
    project
        .compilation
        .all_errors()
        .iter()
        .map(|e| e.kind)
        .collect()
}
