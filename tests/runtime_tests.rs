//! Compile-and-run golden tests for the sequential language: control
//! flow, procedures, arrays, I/O, and the runtime error set.

mod common;

use common::{compile_ok, run, SharedOutput};
use rill::{load_executable, parse_executable, run_program, LoadError, RuntimeError};
use std::io::Cursor;

const PRIME_CHECK: &str = "{\n\
    @ [boolean Result] IsPrime(integer n)\n\
    {\n\
    integer d;\n\
    Result = true;\n\
    if (n < 2) { Result = false; }\n\
    d = 2;\n\
    while (d * d <= n) {\n\
    if (n % d == 0) { Result = false; }\n\
    d = d + 1;\n\
    }\n\
    }\n\
    integer n;\n\
    read n;\n\
    write IsPrime(n);\n\
    }";

#[test]
fn prime_check_accepts_seven() {
    let outcome = run(PRIME_CHECK, "7\n");
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "true\n");
}

#[test]
fn prime_check_rejects_eight() {
    let outcome = run(PRIME_CHECK, "8\n");
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "false\n");
}

#[test]
fn prime_check_rejects_one() {
    let outcome = run(PRIME_CHECK, "1\n");
    assert_eq!(outcome.output, "false\n");
}

#[test]
fn array_index_out_of_bounds_aborts() {
    let outcome = run("{ integer[5] numbers;\nnumbers[6] = 1;\n}", "");
    assert_eq!(outcome.result, Err(RuntimeError::ArrayIndexOutOfBounds));
    assert_eq!(outcome.output, "Array index is out of bounds.\n");
}

#[test]
fn array_index_zero_aborts() {
    let outcome = run("{ integer[5] numbers;\nnumbers[0] = 1;\n}", "");
    assert_eq!(outcome.result, Err(RuntimeError::ArrayIndexOutOfBounds));
}

#[test]
fn boolean_input_format_error() {
    let outcome = run("{ boolean v; read v; }", "0\n");
    assert_eq!(outcome.result, Err(RuntimeError::BooleanInputIncorrectFormat));
    assert_eq!(outcome.output, "Boolean input was not in the correct format.\n");
}

#[test]
fn boolean_input_is_case_insensitive() {
    let outcome = run("{ boolean v; read v; write v; }", "TRUE\n");
    assert_eq!(outcome.result, Ok(()));
    assert_eq!(outcome.output, "true\n");
}

#[test]
fn integer_input_format_error() {
    let outcome = run("{ integer v; read v; }", "seven\n");
    assert_eq!(outcome.result, Err(RuntimeError::IntegerInputIncorrectFormat));
}

#[test]
fn read_consumes_one_line_per_target() {
    let outcome = run(
        "{ integer a, b; read a, b; write a + b; }",
        "30\n12\n",
    );
    assert_eq!(outcome.output, "42\n");
}

#[test]
fn write_emits_one_line_per_value() {
    let outcome = run("{ write 1, 2, true; }", "");
    assert_eq!(outcome.output, "1\n2\ntrue\n");
}

#[test]
fn arithmetic_operators() {
    let outcome = run(
        "{ write 7 + 5, 7 - 5, 7 * 5, 7 / 5, 7 % 5, 2 ^ 10, -3; }",
        "",
    );
    assert_eq!(outcome.output, "12\n2\n35\n1\n2\n1024\n-3\n");
}

#[test]
fn boolean_operators_and_comparisons() {
    let outcome = run(
        "{ write true & false, true | false, !true, 2 < 3, 3 <= 3, 2 == 3, 2 != 3, 2 > 3, 3 >= 3; }",
        "",
    );
    assert_eq!(
        outcome.output,
        "false\ntrue\nfalse\ntrue\ntrue\nfalse\ntrue\nfalse\ntrue\n"
    );
}

#[test]
fn division_by_zero_aborts() {
    let outcome = run("{ integer x; x = 0; write 1 / x; }", "");
    assert_eq!(outcome.result, Err(RuntimeError::DivisionByZero));
    assert_eq!(outcome.output, "Division by zero.\n");
}

#[test]
fn power_overflow_aborts() {
    let outcome = run("{ write 2 ^ 200; }", "");
    assert_eq!(outcome.result, Err(RuntimeError::ArithmeticOverflow));
    assert_eq!(outcome.output, "Arithmetic overflow.\n");
}

#[test]
fn negative_exponent_aborts() {
    let outcome = run("{ integer e; e = 0 - 2; write 3 ^ e; }", "");
    assert_eq!(outcome.result, Err(RuntimeError::ArithmeticOverflow));
}

#[test]
fn unbounded_recursion_overflows_the_stack() {
    let outcome = run(
        "{ @ [integer R] Deep(integer n) { R = Deep(n + 1); } write Deep(1); }",
        "",
    );
    assert_eq!(outcome.result, Err(RuntimeError::StackOverflow));
    assert_eq!(outcome.output, "Stack overflow.\n");
}

#[test]
fn multiple_assignment_swaps() {
    let outcome = run(
        "{ integer x, y; x = 1; y = 2; x, y = y, x; write x, y; }",
        "",
    );
    assert_eq!(outcome.output, "2\n1\n");
}

#[test]
fn arrays_store_and_index() {
    let outcome = run(
        "{\n\
         integer[3] xs;\n\
         integer i;\n\
         i = 1;\n\
         while (i <= 3) { xs[i] = i * i; i = i + 1; }\n\
         write xs[1] + xs[2] + xs[3];\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "14\n");
}

#[test]
fn named_constant_bounds_an_array() {
    let outcome = run(
        "{\n\
         constant size = 4;\n\
         integer[size] xs;\n\
         xs[size] = 9;\n\
         write xs[4];\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "9\n");
}

#[test]
fn reference_parameters_write_through() {
    let outcome = run(
        "{\n\
         @ Bump(reference integer x) { x = x + 1; }\n\
         integer n;\n\
         n = 41;\n\
         Bump(reference n);\n\
         write n;\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "42\n");
}

#[test]
fn array_element_passes_by_reference() {
    let outcome = run(
        "{\n\
         @ Clear(reference integer x) { x = 0; }\n\
         integer[2] xs;\n\
         xs[1] = 5; xs[2] = 6;\n\
         Clear(reference xs[2]);\n\
         write xs[1], xs[2];\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "5\n0\n");
}

#[test]
fn recursive_factorial() {
    let outcome = run(
        "{\n\
         @ [integer R] Fact(integer n)\n\
         {\n\
         if (n < 2) { R = 1; } else { R = n * Fact(n - 1); }\n\
         }\n\
         write Fact(10);\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "3628800\n");
}

#[test]
fn nested_procedures_see_enclosing_frames() {
    let outcome = run(
        "{\n\
         @ [integer R] Outer(integer a)\n\
         {\n\
         integer b;\n\
         @ [integer S] Inner(integer c) { S = a + b + c; }\n\
         b = 10;\n\
         R = Inner(100);\n\
         }\n\
         write Outer(1);\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "111\n");
}

#[test]
fn constants_are_compile_time_values() {
    let outcome = run(
        "{ constant width = 6; constant height = -7; write width * height; }",
        "",
    );
    assert_eq!(outcome.output, "-42\n");
}

#[test]
fn randomize_yields_a_value_in_range() {
    let outcome = run("{ integer r; randomize r; write r; }", "");
    assert_eq!(outcome.result, Ok(()));
    let value: i64 = outcome.output.trim().parse().unwrap();
    assert!((0..=i32::MAX as i64).contains(&value));
}

#[test]
fn else_branch_runs_on_false() {
    let outcome = run(
        "{ integer n; read n; if (n % 2 == 0) { write 0; } else { write 1; } }",
        "9\n",
    );
    assert_eq!(outcome.output, "1\n");
}

#[test]
fn artifact_round_trips_through_disk() {
    let code = compile_ok("{ write 13597; }");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.ric");
    std::fs::write(&path, rill::assembler::render_executable(&code)).unwrap();
    let loaded = load_executable(&path).unwrap();
    assert_eq!(loaded, code);
    let output = SharedOutput::default();
    run_program(loaded, Cursor::new(""), output.clone()).unwrap();
    assert_eq!(output.text(), "13597\n");
}

#[test]
fn loader_rejects_malformed_artifacts() {
    assert!(matches!(
        parse_executable("1\n2\nnot a number\n"),
        Err(LoadError::Malformed { line: 3 })
    ));
}

#[test]
fn statement_calls_of_value_procedures_are_legal() {
    let outcome = run(
        "{\n\
         integer hits;\n\
         @ [integer R] Touch() { hits = hits + 1; R = hits; }\n\
         hits = 0;\n\
         Touch();\n\
         Touch();\n\
         write hits;\n\
         }",
        "",
    );
    assert_eq!(outcome.output, "2\n");
}
