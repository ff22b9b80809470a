//! Whole-pipeline scenarios: each compiles a project, runs the produced
//! module on the evaluating backend and checks the exit code.

mod common;

use common::run_project;

#[test]
fn arithmetic() {
    let code = run_project(
        &[(
            "main",
            "module Arithmetic {
                static int main() {
                    int value = ((44*3 + 55 - 421*22) / (4+1)) * (3-1);
                    return value * value;
                }
            }",
        )],
        "main",
    );
    // ((132 + 55 - 9262) / 5) * 2 = -3630, squared
    assert_eq!(code, 13_176_900);
}

#[test]
fn casts() {
    let code = run_project(
        &[(
            "main",
            "module Casts {
                static int main() {
                    byte b = 5;
                    short c = cast(short) (b + 3);
                    int a = c + b;
                    double d = 21.0 + c / a;
                    int j = cast(int) d;
                    return j;
                }
            }",
        )],
        "main",
    );
    // c = 8, a = 13, c / a = 0, d = 21.0
    assert_eq!(code, 21);
}

#[test]
fn loop_sum() {
    let code = run_project(
        &[(
            "main",
            "module LoopSum {
                static int main() {
                    int sum = 0;
                    for int i = 0; i < 55; ++i {
                        sum += i;
                    }
                    return sum;
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 1485);
}

#[test]
fn simple_array() {
    let code = run_project(
        &[(
            "main",
            "module SimpleArray {
                static int main() {
                    int[] arr = {44, 22, 832, 1};
                    int sum = 0;
                    for int i = 0; i < 4; ++i {
                        sum += arr[i];
                    }
                    return sum;
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 899);
}

#[test]
fn string_array() {
    let code = run_project(
        &[(
            "main",
            "module StringArray {
                static int main() {
                    char[] text = \"Hello World!\";
                    int n = cast(int) text.length;
                    int sum = 0;
                    for int i = 0; i < n; ++i {
                        sum += text[i];
                    }
                    return sum * 3;
                }
            }",
        )],
        "main",
    );
    // The ASCII bytes of "Hello World!" sum to 1085
    assert_eq!(code, 1085 * 3);
}

#[test]
fn function_overloading() {
    let code = run_project(
        &[(
            "main",
            "module Overloads {
                static int f(int x) { return 77; }
                static int f(double x) { return 88; }
                static int main() {
                    return f(1) + f(2.0);
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 77 + 88);
}

#[test]
fn array_length_round_trip() {
    let code = run_project(
        &[(
            "main",
            "module Lengths {
                static int main() {
                    int[] arr = {9, 9, 9, 9, 9};
                    int n = arr.length;
                    return n;
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 5);
}

#[test]
fn members_and_constructors_across_imports() {
    let code = run_project(
        &[
            (
                "util/vec",
                "module Vec2 {
                    int x = 0;
                    int y = 0;
                    Vec2(int start_x, int start_y) {
                        this.x = start_x;
                        this.y = start_y;
                    }
                    int sum() { return x + y; }
                }",
            ),
            (
                "main",
                "import util.vec;
                module App {
                    static int main() {
                        Vec2 v = Vec2(40, 2);
                        return v.sum();
                    }
                }",
            ),
        ],
        "main",
    );
    assert_eq!(code, 42);
}

#[test]
fn nested_modules_with_default_constructors() {
    let code = run_project(
        &[(
            "main",
            "module Inner {
                int value = 7;
            }
            module Outer {
                Inner inner = Inner();
                int boost = 2;
                int calc() { return inner.value * boost; }
            }
            module App {
                static int main() {
                    Outer o = Outer();
                    return o.calc();
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 14);
}

#[test]
fn globals_and_startup_wiring() {
    let code = run_project(
        &[(
            "main",
            "module Counters {
                static int total = 5;
                static int[] values = {1, 2, 3};
                static void StartUp() {
                    total = total + 1;
                }
                static int main() {
                    return total + values[2];
                }
            }",
        )],
        "main",
    );
    // StartUp bumps the embedded 5 to 6 before main's first statement;
    // the array initializer was deferred into main's preamble
    assert_eq!(code, 9);
}

#[test]
fn static_calls_between_cyclic_imports() {
    let code = run_project(
        &[
            (
                "a",
                "import b;
                module A {
                    static int value() { return 20; }
                    static int main() { return B.value() + 1; }
                }",
            ),
            (
                "b",
                "import a;
                module B {
                    static int value() { return A.value() * 2; }
                }",
            ),
        ],
        "a",
    );
    assert_eq!(code, 41);
}

#[test]
fn short_circuit_evaluation() {
    let code = run_project(
        &[(
            "main",
            "module ShortCircuit {
                static int touched = 0;
                static bool touch() {
                    touched = touched + 1;
                    return true;
                }
                static int main() {
                    bool gate = false;
                    if gate && touch() {
                        return 100;
                    }
                    if true || touch() {
                        return touched;
                    }
                    return 50;
                }
            }",
        )],
        "main",
    );
    // Neither guard may evaluate touch()
    assert_eq!(code, 0);
}

#[test]
fn while_loops_and_widening() {
    let code = run_project(
        &[(
            "main",
            "module Widening {
                static int main() {
                    byte step = 3;
                    int total = 0;
                    while total < 100 {
                        total += step;
                    }
                    return total;
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 102);
}

#[test]
fn multidimensional_arrays() {
    let code = run_project(
        &[(
            "main",
            "module Grid {
                static int main() {
                    int[2][3] grid = {{1, 2, 3}, {4, 5, 6}};
                    int sum = 0;
                    for int row = 0; row < 2; ++row {
                        for int col = 0; col < 3; ++col {
                            sum += grid[row][col];
                        }
                    }
                    return sum;
                }
            }",
        )],
        "main",
    );
    assert_eq!(code, 21);
}
