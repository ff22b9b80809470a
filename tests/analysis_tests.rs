//! Semantic rules exercised through the whole pipeline: assignability
//! boundaries, control-flow proofs, dot-expression rules and array checks.

mod common;

use common::{build_project, expect_errors, run_project};
use nylac::compiler::compiler_errors::ErrorKind;

fn main_body(body: &str) -> Vec<(&'static str, String)> {
    vec![(
        "main",
        format!(
            "module App {{
                static int main() {{
                    {body}
                }}
            }}"
        ),
    )]
}

fn expect_body_errors(body: &str) -> Vec<ErrorKind> {
    let files = main_body(body);
    let files: Vec<(&str, &str)> = files.iter().map(|(p, s)| (*p, s.as_str())).collect();
    expect_errors(&files, "main")
}

fn run_body(body: &str) -> i32 {
    let files = main_body(body);
    let files: Vec<(&str, &str)> = files.iter().map(|(p, s)| (*p, s.as_str())).collect();
    run_project(&files, "main")
}

#[test]
fn narrowing_assignment_is_rejected() {
    let kinds = expect_body_errors("int a = 300; byte b = a; return 0;");
    assert!(kinds.contains(&ErrorKind::CannotAssign));
}

#[test]
fn widening_assignment_is_accepted() {
    assert_eq!(run_body("byte b = 5; int a = b; return a;"), 5);
}

#[test]
fn null_assigns_to_pointers_only() {
    assert_eq!(run_body("int* p = null; return 0;"), 0);

    let kinds = expect_body_errors("int a = null; return 0;");
    assert!(kinds.contains(&ErrorKind::CannotAssign));
}

#[test]
fn cyclic_fields_are_rejected() {
    let kinds = expect_errors(
        &[(
            "main",
            "module A { B b; }
            module B { A a; }
            module App {
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CircularFields));
}

#[test]
fn self_referential_field_is_rejected() {
    let kinds = expect_errors(
        &[(
            "main",
            "module Selfish { Selfish inner; }
            module App {
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CircularFields));
}

#[test]
fn use_before_declaration_is_rejected() {
    let kinds = expect_body_errors("int a = b; int b = 2; return a;");
    assert!(kinds.contains(&ErrorKind::UseOfVariableBeforeDeclaration));
}

#[test]
fn undeclared_variable_is_rejected() {
    let kinds = expect_body_errors("return missing;");
    assert!(kinds.contains(&ErrorKind::UndeclaredVariable));
}

#[test]
fn statements_after_return_are_rejected() {
    let kinds = expect_body_errors("return 0; int a = 1;");
    assert!(kinds.contains(&ErrorKind::StmtsAfterReturn));
}

#[test]
fn non_void_function_must_prove_a_return() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                static int partial(bool flag) {
                    if flag { return 1; }
                }
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::FunctionExpectsReturn));
}

#[test]
fn if_chain_with_trailing_else_proves_return() {
    let code = run_project(
        &[(
            "main",
            "module App {
                static int pick(int x) {
                    if x > 10 {
                        return 1;
                    } else if x > 5 {
                        return 2;
                    } else {
                        return 3;
                    }
                }
                static int main() { return pick(7); }
            }",
        )],
        "main",
    );
    assert_eq!(code, 2);
}

#[test]
fn loops_do_not_prove_returns() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                static int stuck() {
                    while true { return 1; }
                }
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::FunctionExpectsReturn));
}

#[test]
fn conditions_must_be_bool() {
    let kinds = expect_body_errors("if 1 { return 1; } return 0;");
    assert!(kinds.contains(&ErrorKind::ExpectedBoolCond));
}

#[test]
fn bitwise_operators_reject_floats() {
    let kinds = expect_body_errors("double d = 1.0; int a = 2; return a % d;");
    assert!(kinds.contains(&ErrorKind::OpCannotApplyTo));
}

#[test]
fn logical_operators_require_bools() {
    let kinds = expect_body_errors("int a = 1; if a && true { return 1; } return 0;");
    assert!(kinds.contains(&ErrorKind::OpCannotApplyTo));
}

#[test]
fn this_outside_a_dot_expression_is_rejected() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                int field = 1;
                int broken() {
                    this;
                    return 0;
                }
                static int main() { return 0; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::ThisKeywordExpectsDotOp));
}

#[test]
fn this_in_static_context_is_rejected() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                int field = 1;
                static int main() { return this.field; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CannotUseThisKeywordInStaticContext));
}

#[test]
fn fields_are_not_visible_from_static_context() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                int field = 1;
                static int main() { return field; }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::AccessingFieldFromStaticContext));
}

#[test]
fn member_calls_need_an_instance() {
    let kinds = expect_errors(
        &[(
            "main",
            "module App {
                int bump() { return 1; }
                static int main() { return bump(); }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CalledNonStaticFuncFromStatic));
}

#[test]
fn private_members_are_hidden_across_modules() {
    let kinds = expect_errors(
        &[(
            "main",
            "module Vault {
                private static int secret() { return 1; }
            }
            module App {
                static int main() { return Vault.secret(); }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::FunctionNotVisible));
}

#[test]
fn unknown_function_is_reported() {
    let kinds = expect_body_errors("return nothing_here(1);");
    assert!(kinds.contains(&ErrorKind::CouldNotFindFunction));
}

#[test]
fn unknown_constructor_is_reported() {
    let kinds = expect_errors(
        &[(
            "main",
            "module Point {
                int x = 0;
                Point(int start) { this.x = start; }
            }
            module App {
                static int main() {
                    Point p = Point(1, 2);
                    return 0;
                }
            }",
        )],
        "main",
    );
    assert!(kinds.contains(&ErrorKind::CouldNotFindConstructor));
}

#[test]
fn array_literal_overflow_is_rejected() {
    let kinds = expect_body_errors("int[2] a = {1, 2, 3}; return 0;");
    assert!(kinds.contains(&ErrorKind::ArrTooManyInitValues));
}

#[test]
fn array_sizes_must_be_positive() {
    let kinds = expect_body_errors("int[0 - 1] a; return 0;");
    assert!(kinds.contains(&ErrorKind::ArrSizeMustBePositive));
}

#[test]
fn array_sizes_must_be_constant() {
    let kinds = expect_body_errors("int n = 4; int[n] a; return 0;");
    assert!(kinds.contains(&ErrorKind::ArrSizeNotConstant));
}

#[test]
fn array_indexes_must_be_integers() {
    let kinds = expect_body_errors("int[] a = {1}; return a[1.5];");
    assert!(kinds.contains(&ErrorKind::ArrayAccessExpectsInt));
}

#[test]
fn indexing_past_the_element_type_is_rejected() {
    let kinds = expect_body_errors("int[] a = {1}; return a[0][0];");
    assert!(kinds.contains(&ErrorKind::ArrayAccessOnInvalidType));
}

#[test]
fn array_elements_must_fit_the_destination() {
    let kinds = expect_body_errors("byte[] a = {1000000}; return 0;");
    assert!(kinds.contains(&ErrorKind::ElementOfArrayNotCompatibleWithArray));
}

#[test]
fn array_after_dot_only_admits_length() {
    let kinds = expect_body_errors("int[] a = {1}; return a.size;");
    assert!(kinds.contains(&ErrorKind::TypeDoesNotHaveField));
}

#[test]
fn overload_ties_pick_the_first_declared() {
    // Both candidates need one widening conversion; declaration order wins
    let code = run_project(
        &[(
            "main",
            "module App {
                static int f(long a) { return 1; }
                static int f(double a) { return 2; }
                static int main() { return f(5); }
            }",
        )],
        "main",
    );
    assert_eq!(code, 1);
}

#[test]
fn sized_array_without_initializer_is_zeroed() {
    let code = run_body(
        "int[4] a;
         int sum = 0;
         for int i = 0; i < 4; ++i {
             sum += a[i];
         }
         return sum;",
    );
    assert_eq!(code, 0);
}

#[test]
fn declared_size_beats_literal_length_for_length_reads() {
    let project = build_project(
        &[(
            "main",
            "module App {
                static int main() {
                    int[8] a = {1, 2};
                    return a.length;
                }
            }",
        )],
        "main",
    );
    assert!(project.ok, "{:#?}", project.compilation.all_errors());
}
