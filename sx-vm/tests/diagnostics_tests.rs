mod common;

use common::{compile, recording_natives, run_source_fault};
use sx::{Vm, compile_source, render_source_error, render_vm_error};

#[test]
fn compile_error_points_at_the_form() {
    let source = "(print ())";
    let err = compile_source(source).expect_err("empty form should fail");
    assert_eq!(
        render_source_error("demo.sx", source, &err),
        "error[E_COMPILE]: compile error: empty form\n --> demo.sx:1:8\n  |\n  1 | (print ())\n  |        ^^"
    );
}

#[test]
fn lex_error_reports_line_and_column() {
    let source = "(print 1)\n  #bad";
    let err = compile_source(source).expect_err("lex should fail");
    let rendered = render_source_error("demo.sx", source, &err);
    assert!(rendered.starts_with("error[E_LEX]: lex error: no token matches at offset 12"));
    assert!(rendered.contains(" --> demo.sx:2:3"));
    assert!(rendered.contains("  2 |   #bad"));
    assert!(rendered.ends_with("  |   ^"));
}

#[test]
fn parse_error_for_unclosed_paren() {
    let source = "(print\n  (add 1 2)";
    let err = compile_source(source).expect_err("unclosed paren should fail");
    let rendered = render_source_error("demo.sx", source, &err);
    assert!(rendered.starts_with("error[E_PARSE]: parse error: unclosed open paren"));
    assert!(rendered.contains(" --> demo.sx:1:1"));
}

#[test]
fn runtime_report_lists_code_stack_and_environment() {
    let fault = run_source_fault("1 'two' ((fn (a) (emit nope)) 5)");
    assert_eq!(fault.error.to_string(), "unbound name 'nope'");

    let report = &fault.report;
    assert!(report.starts_with("runtime error: unbound name 'nope'\nat pc "));
    let near = report
        .split("\nnear:\n")
        .nth(1)
        .expect("report should have a near section");
    assert!(near.starts_with("        $nope $emit (1)"));

    let stack = report
        .split("\nstack:\n")
        .nth(1)
        .expect("report should have a stack section");
    assert!(stack.starts_with("    'two'\n    1\n"));

    let environment = report
        .split("\nenvironment:\n")
        .nth(1)
        .expect("report should have an environment section");
    assert_eq!(environment, "    a = 5\n    *parent* = {...}");
}

#[test]
fn runtime_report_marks_empty_stack() {
    let fault = run_source_fault("(emit missing)");
    assert!(fault.report.contains("\nstack:\n    * empty *\n"));
    assert!(fault.report.contains("    emit = <native emit>"));
}

#[test]
fn render_vm_error_matches_fault_report() {
    let (natives, _) = recording_natives();
    let mut vm = Vm::new(compile("(sub 1)"), &natives);
    let fault = vm.run().expect_err("vm should fault");
    assert_eq!(render_vm_error(&vm, &fault.error), fault.report);
    assert!(
        fault
            .report
            .starts_with("runtime error: arity mismatch: expected 2 arguments, got 1")
    );
}
