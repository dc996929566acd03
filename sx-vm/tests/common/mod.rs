#![allow(dead_code, unused_imports)]

use std::cell::RefCell;
use std::rc::Rc;

pub use sx::{
    Instruction, NativeRegistry, Program, RuntimeFault, Value, Vm, VmError, VmResult, VmStatus,
    assemble, compile_source, parse_text, render_text,
};

/// Lines written by the `emit` native, in call order.
pub type Transcript = Rc<RefCell<Vec<String>>>;

/// Builtins plus an `emit` native that records its arguments instead of
/// printing them.
pub fn recording_natives() -> (NativeRegistry, Transcript) {
    let transcript: Transcript = Rc::new(RefCell::new(Vec::new()));
    let mut natives = NativeRegistry::with_builtins();
    let sink = Rc::clone(&transcript);
    natives.register("emit", move |_vm: &mut Vm, args: &[Value]| -> VmResult<()> {
        let line: Vec<String> = args.iter().map(Value::to_string).collect();
        sink.borrow_mut().push(line.join(" "));
        Ok(())
    });
    (natives, transcript)
}

pub fn compile(source: &str) -> Program {
    compile_source(source)
        .expect("compile should succeed")
        .program
}

/// Compiles and runs `source` to completion, returning the halted vm and the
/// `emit` transcript.
pub fn run_source(source: &str) -> (Vm, Vec<String>) {
    let (natives, transcript) = recording_natives();
    let mut vm = Vm::new(compile(source), &natives);
    let status = vm.run().expect("vm should run");
    assert_eq!(status, VmStatus::Halted);
    let lines = transcript.borrow().clone();
    (vm, lines)
}

pub fn run_source_fault(source: &str) -> RuntimeFault {
    let (natives, _) = recording_natives();
    let mut vm = Vm::new(compile(source), &natives);
    vm.run().expect_err("vm should fault")
}

pub fn run_asm(text: &str) -> (Vm, Vec<String>) {
    let (natives, transcript) = recording_natives();
    let program = assemble(text).expect("assemble should succeed");
    let mut vm = Vm::new(program, &natives);
    let status = vm.run().expect("vm should run");
    assert_eq!(status, VmStatus::Halted);
    let lines = transcript.borrow().clone();
    (vm, lines)
}

pub fn run_asm_fault(text: &str) -> RuntimeFault {
    let (natives, _) = recording_natives();
    let program = assemble(text).expect("assemble should succeed");
    let mut vm = Vm::new(program, &natives);
    vm.run().expect_err("vm should fault")
}
