//! Orchestrator behavior: dependency ordering, cycle tolerance, failure
//! propagation and entry-point bookkeeping.

mod common;

use common::{build_project, expect_errors};
use nylac::compiler::compiler_errors::ErrorKind;
use nylac::compiler::unit::UnitPhase;

#[test]
fn dependency_chain_reaches_bodies_emitted() {
    let project = build_project(
        &[
            (
                "main",
                "import mid;
                module App {
                    static int main() { return Mid.value(); }
                }",
            ),
            (
                "mid",
                "import leaf;
                module Mid {
                    static int value() { return Leaf.value(); }
                }",
            ),
            (
                "leaf",
                "module Leaf {
                    static int value() { return 3; }
                }",
            ),
        ],
        "main",
    );
    assert!(project.ok, "{:#?}", project.compilation.all_errors());

    for path in ["main", "mid", "leaf"] {
        let unit = project.compilation.unit_by_path(path).unwrap();
        assert_eq!(unit.phase, UnitPhase::BodiesEmitted, "unit {path}");
    }
}

#[test]
fn units_outside_the_main_graph_stop_at_analysis() {
    let project = build_project(
        &[
            (
                "main",
                "module App {
                    static int main() { return 0; }
                }",
            ),
            (
                "standalone",
                "module Standalone {
                    static int helper() { return 1; }
                }",
            ),
        ],
        "main",
    );
    assert!(project.ok);

    let main_unit = project.compilation.unit_by_path("main").unwrap();
    assert_eq!(main_unit.phase, UnitPhase::BodiesEmitted);

    // Nothing imports it, so it is only checked
    let standalone = project.compilation.unit_by_path("standalone").unwrap();
    assert_eq!(standalone.phase, UnitPhase::Analyzed);
}

#[test]
fn mutual_imports_terminate_and_emit_both_units() {
    let project = build_project(
        &[
            (
                "a",
                "import b;
                module A {
                    static int one() { return 1; }
                    static int main() { return B.two(); }
                }",
            ),
            (
                "b",
                "import a;
                module B {
                    static int two() { return A.one() + 1; }
                }",
            ),
        ],
        "a",
    );
    assert!(project.ok, "{:#?}", project.compilation.all_errors());

    assert_eq!(
        project.compilation.unit_by_path("a").unwrap().phase,
        UnitPhase::BodiesEmitted
    );
    assert_eq!(
        project.compilation.unit_by_path("b").unwrap().phase,
        UnitPhase::BodiesEmitted
    );
}

#[test]
fn failing_dependency_marks_the_dependent_failed() {
    let project = build_project(
        &[
            (
                "main",
                "import broken;
                module App {
                    static int main() { return 0; }
                }",
            ),
            (
                "broken",
                "module Broken {
                    static int f() { return true; }
                }",
            ),
        ],
        "main",
    );
    assert!(!project.ok);

    let kinds: Vec<ErrorKind> = project
        .compilation
        .all_errors()
        .iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&ErrorKind::ReturnValueNotCompatibleWithReturnType));

    assert_eq!(
        project.compilation.unit_by_path("broken").unwrap().phase,
        UnitPhase::Failed
    );
    assert_eq!(
        project.compilation.unit_by_path("main").unwrap().phase,
        UnitPhase::Failed
    );
}

#[test]
fn missing_import_is_reported() {
    let kinds = expect_errors(
        &[(
            "main",
            "import ghost;
            module App {
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CouldNotFindImport));
}

#[test]
fn multiple_mains_are_rejected() {
    let kinds = expect_errors(
        &[
            (
                "main",
                "module App {
                    static int main() { return 0; }
                }",
            ),
            (
                "other",
                "module Other {
                    static int main() { return 1; }
                }",
            ),
        ],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::MultipleMainFunctionsInProgram));
}

#[test]
fn missing_main_function_is_reported() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                static int helper() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::MainFunctionNotFound));
}

#[test]
fn nominated_main_file_must_exist() {
    let kinds = expect_errors(
        &[(
            "lib",
            "module Lib {
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::FileWithMainFunctionDoesNotExist));
}

#[test]
fn module_aliases_rename_imports() {
    let project = build_project(
        &[
            (
                "main",
                "import shapes { Box = Rect };
                module App {
                    static int main() { return Box.area(4, 5); }
                }",
            ),
            (
                "shapes",
                "module Rect {
                    static int area(int w, int h) { return w * h; }
                }",
            ),
        ],
        "main",
    );
    assert!(project.ok, "{:#?}", project.compilation.all_errors());
}

#[test]
fn alias_of_unknown_module_is_reported() {
    let kinds = expect_errors(
        &[
            (
                "main",
                "import shapes { Box = Circle };
                module App {
                    static int main() { return 0; }
                }",
            ),
            ("shapes", "module Rect { }"),
        ],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CouldNotFindModuleType));
}
