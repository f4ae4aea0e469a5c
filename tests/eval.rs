//! Integration tests for ratus-eval crate.

use pretty_assertions::assert_eq;
use ratus_eval::{EvalConfig, Evaluator, FaultKind, RuntimeFault, evaluate};

fn run(source: &str) -> Result<String, RuntimeFault> {
    let module = ratus_parser::parse_source(source).expect("test source parses");
    let checked = ratus_typeck::check(&module).unwrap_or_else(|errs| panic!("unexpected type errors: {errs:#?}"));
    evaluate(&checked, &EvalConfig::default()).map(|v| v.to_string())
}

fn run_ok(source: &str) -> String {
    run(source).unwrap_or_else(|fault| panic!("unexpected fault: {fault:?}"))
}

/// Evaluate without type checking, to reach faults the checker rules out.
fn run_unchecked(source: &str) -> Result<String, RuntimeFault> {
    let module = ratus_parser::parse_source(source).expect("test source parses");
    let mut evaluator = Evaluator::new(EvalConfig::default());
    evaluator.eval_module(&module).map(|v| v.to_string())
}

// ============================================================================
// Values
// ============================================================================

#[test]
fn test_basic_values() {
    assert_eq!(run_ok("1 + 2"), "3");
    assert_eq!(run_ok("2.5 * 2"), "5.0");
    assert_eq!(run_ok("\"a\" + \"b\""), "ab");
    assert_eq!(run_ok("not true or 1 < 2"), "true");
    assert_eq!(run_ok("none"), "none");
}

#[test]
fn test_attribute_of_none_member() {
    assert_eq!(run_ok("let x = {y: none}; x.y"), "none");
}

#[test]
fn test_structural_equality() {
    assert_eq!(run_ok("let r = {a: 1, b: [2]}; r == {b: [2], a: 1}"), "true");
    assert_eq!(run_ok("\"a\" != \"b\""), "true");
}

#[test]
fn test_short_circuit() {
    assert_eq!(run_ok("false and 1 / 0 == 0"), "false");
    assert_eq!(run_ok("true or 1 / 0 == 0"), "true");
}

#[test]
fn test_builtins() {
    assert_eq!(run_ok("len([1, 2, 3]) + len(\"ab\")"), "5");
    assert_eq!(run_ok("str(1.5) + str(none)"), "1.5none");
    assert_eq!(run_ok("int(3.9) + int(-3.9)"), "0");
    assert_eq!(run_ok("float(2)"), "2.0");
    assert_eq!(run_ok("range(2, 5)"), "[2, 3, 4]");
    assert_eq!(run_ok("push([1], 2)"), "[1, 2]");
}

#[test]
fn test_nested_rendering() {
    assert_eq!(
        run_ok("let r = {name: \"x\", tags: [\"a\", \"b\"], next: none}; r"),
        "{name: \"x\", tags: [\"a\", \"b\"], next: none}"
    );
}

// ============================================================================
// Functions and Closures
// ============================================================================

#[test]
fn test_functions_and_templates() {
    let source = "
        fn twice(f, x) { return f(f(x)); }
        let inc = fn(n: Int) -> Int { return n + 1; };
        twice(inc, 5)
    ";
    assert_eq!(run_ok(source), "7");
}

#[test]
fn test_mutual_recursion() {
    let source = "
        fn is_even(n: Int) -> Bool { if n == 0 { return true; } return is_odd(n - 1); }
        fn is_odd(n: Int) -> Bool { if n == 0 { return false; } return is_even(n - 1); }
        is_even(10)
    ";
    assert_eq!(run_ok(source), "true");
}

#[test]
fn test_closure_sees_later_updates() {
    let source = "
        var base = 1;
        fn add(x: Int) -> Int { return x + base; }
        base = 10;
        add(5)
    ";
    assert_eq!(run_ok(source), "15");
}

#[test]
fn test_values_are_copied_on_assignment() {
    let source = "
        var xs = [1, 2, 3];
        let ys = xs;
        xs[1] = 20;
        let zs = push(ys, 4);
        [xs, ys, zs]
    ";
    assert_eq!(run_ok(source), "[[1, 20, 3], [1, 2, 3], [1, 2, 3, 4]]");
}

#[test]
fn test_fallthrough_returns_none() {
    assert_eq!(run_ok("fn f(x: Int) { if x > 0 { return x; } } f(-1)"), "none");
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_division_by_zero_points_at_division() {
    let fault = run("let a = 4;\nlet b = a / (a - 4);").expect_err("faults");
    assert_eq!(fault.kind, FaultKind::DivisionByZero);
    assert_eq!(fault.span.range(), 19..30);
    assert_eq!(fault.kind.name(), "DivisionByZero");
}

#[test]
fn test_index_out_of_range() {
    let fault = run("let xs = [1]; xs[-1]").expect_err("faults");
    assert_eq!(fault.kind, FaultKind::IndexOutOfRange);
    let fault = run("var xs = [1]; xs[3] = 2;").expect_err("faults");
    assert_eq!(fault.kind, FaultKind::IndexOutOfRange);
}

#[test]
fn test_faults_without_checking() {
    assert_eq!(
        run_unchecked("let r = {a: 1}; r.b").map_err(|f| f.kind),
        Err(FaultKind::MissingMemberAccess)
    );
    assert_eq!(run_unchecked("1 + \"a\"").map_err(|f| f.kind), Err(FaultKind::TypeMismatch));
    assert_eq!(run_unchecked("y").map_err(|f| f.kind), Err(FaultKind::UnboundName));
    assert_eq!(run_unchecked("len(1, 2)").map_err(|f| f.kind), Err(FaultKind::TypeMismatch));
}

#[test]
fn test_limits() {
    let module = ratus_parser::parse_source("var i = 0; while i < 1000000 { i = i + 1; }").expect("parses");
    let checked = ratus_typeck::check(&module).expect("well typed");
    let config = EvalConfig {
        max_steps: Some(500),
        ..EvalConfig::default()
    };
    let fault = evaluate(&checked, &config).expect_err("stops");
    assert_eq!(fault.kind, FaultKind::StepLimitExceeded);

    let module = ratus_parser::parse_source("fn f(n: Int) -> Int { return f(n + 1); } f(0)").expect("parses");
    let checked = ratus_typeck::check(&module).expect("well typed");
    let config = EvalConfig {
        max_call_depth: 16,
        ..EvalConfig::default()
    };
    let fault = evaluate(&checked, &config).expect_err("stops");
    assert_eq!(fault.kind, FaultKind::CallDepthExceeded);
}

#[test]
fn test_huge_ranges_fault_instead_of_allocating() {
    let fault = run("len(range(100000000000))").expect_err("refuses the allocation");
    assert_eq!(fault.kind, FaultKind::AllocationLimitExceeded);
    assert_eq!(fault.span.range(), 4..23);
    let diagnostic = ratus_diagnostic::Diagnostic::from(&fault);
    assert_eq!(diagnostic.code, Some(ratus_diagnostic::ErrorCode::AllocationLimitExceeded));

    let module = ratus_parser::parse_source("len(range(5000))").expect("parses");
    let checked = ratus_typeck::check(&module).expect("well typed");
    let config = EvalConfig {
        max_steps: Some(1_000),
        ..EvalConfig::default()
    };
    let fault = evaluate(&checked, &config).expect_err("ranges cost steps");
    assert_eq!(fault.kind, FaultKind::StepLimitExceeded);
}

#[test]
fn test_fault_converts_to_diagnostic() {
    let fault = run("1 / 0").expect_err("faults");
    let diagnostic = ratus_diagnostic::Diagnostic::from(&fault);
    assert_eq!(diagnostic.kind, ratus_diagnostic::DiagnosticKind::Runtime);
    assert_eq!(diagnostic.code, Some(ratus_diagnostic::ErrorCode::DivisionByZero));
    assert_eq!(diagnostic.span, fault.span);
}
