mod common;

use std::path::Path;
use std::rc::Rc;

use common::{Value, Vm, VmResult, VmStatus, recording_natives};
use sx::{NativeRegistry, assemble, compile_source, compile_source_file, parse_text, render_text};

fn demo_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// Runs a demo with `print` recording into the transcript instead of stdout.
fn run_demo(name: &str) -> (Vec<Value>, Vec<String>) {
    let (mut natives, transcript) = recording_natives();
    let sink = Rc::clone(&transcript);
    natives.register("print", move |_vm: &mut Vm, args: &[Value]| -> VmResult<()> {
        let line: Vec<String> = args.iter().map(Value::to_string).collect();
        sink.borrow_mut().push(line.join(" "));
        Ok(())
    });
    let source = std::fs::read_to_string(demo_path(name)).expect("demo should be readable");
    let program = if name.ends_with(".sxa") {
        assemble(&source).expect("demo should assemble")
    } else {
        compile_source(&source).expect("demo should compile").program
    };
    let mut vm = Vm::new(program, &natives);
    assert_eq!(vm.run().expect("demo should run"), VmStatus::Halted);
    let lines = transcript.borrow().clone();
    (vm.stack().to_vec(), lines)
}

#[test]
fn main_demo_prints_greeting_sum_and_count() {
    let (stack, lines) = run_demo("main.sx");
    assert_eq!(lines, vec!["hello, world", "sum 5", "count 2"]);
    assert!(stack.is_empty());
}

#[test]
fn factorial_demo_leaves_result() {
    let (stack, lines) = run_demo("factorial.sx");
    assert!(lines.is_empty());
    assert_eq!(stack, vec![Value::Int(120)]);
}

#[test]
fn countdown_demo_runs_tail_calls() {
    let (stack, lines) = run_demo("countdown.sxa");
    assert_eq!(lines, vec!["3", "2", "1", "liftoff"]);
    assert!(stack.is_empty());
}

#[test]
fn demo_sources_compile_from_disk_with_builtins() {
    for name in ["main.sx", "factorial.sx"] {
        let compiled = compile_source_file(demo_path(name)).expect("demo should compile");
        let text = render_text(compiled.program.instructions(), false);
        let reparsed = parse_text(&text).expect("listing should parse");
        assert_eq!(reparsed, compiled.program.instructions());
        let _vm = compiled.into_vm(&NativeRegistry::with_builtins());
    }
}
