mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use common::{
    Value, Vm, VmError, VmStatus, assemble, compile, recording_natives, run_asm, run_asm_fault,
    run_source, run_source_fault,
};
use sx::{NativeRegistry, VmResult};

#[test]
fn do_block_leaves_last_value_on_top() {
    let (vm, _) = run_source("(do 1 2 3)");
    assert_eq!(vm.stack().last(), Some(&Value::Int(3)));
    assert_eq!(
        vm.stack(),
        &[Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert!(vm.is_halted());
}

#[test]
fn fn_literal_call_returns_first_argument() {
    let (vm, _) = run_source("((fn (a b) a) 10 20)");
    assert_eq!(vm.stack(), &[Value::Int(10)]);
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn zero_is_truthy_so_when_body_runs() {
    let fault = run_source_fault("(when 0 (set x 1))");
    assert_eq!(fault.error, VmError::UnboundName("x".to_string()));
}

#[test]
fn set_inside_when_updates_enclosing_binding() {
    let (vm, lines) = run_source("((fn (x) (when 0 (set x 1)) (emit x) x) 7)");
    assert_eq!(lines, vec!["1"]);
    assert_eq!(vm.stack(), &[Value::Int(1)]);
}

#[test]
fn only_boolean_false_skips_when_body() {
    let (_, lines) = run_source(
        "(when (eq 1 2) (emit 'false ran'))\n\
         (when (eq 1 1) (emit 'true ran'))\n\
         (when '' (emit 'empty string ran'))\n\
         (when 0 (emit 'zero ran'))",
    );
    assert_eq!(lines, vec!["true ran", "empty string ran", "zero ran"]);
}

#[test]
fn closures_share_their_captured_environment() {
    let (_, lines) = run_source(
        "((fn (count)
            ((fn (inc peek)
               (inc) (inc) (peek) (inc) (peek))
             (fn () (set count (add count 1)))
             (fn () (emit count))))
          0)",
    );
    assert_eq!(lines, vec!["2", "3"]);
}

#[test]
fn each_call_gets_a_fresh_frame() {
    let (_, lines) = run_source(
        "((fn (make)
            ((fn (a b) (a) (a) (b)) (make) (make)))
          (fn ()
            ((fn (n) (fn () (set n (add n 1)) (emit n))) 0)))",
    );
    assert_eq!(lines, vec!["1", "2", "1"]);
}

#[test]
fn parameter_shadows_outer_name() {
    let (_, lines) = run_source(
        "((fn (x)
            ((fn (x) (set x 99) (emit x)) 5)
            (emit x))
          1)",
    );
    assert_eq!(lines, vec!["99", "1"]);
}

#[test]
fn recursion_through_rebound_parameter() {
    let (vm, _) = run_source(
        "((fn (fact result)
            (set fact (fn (n)
              (when (gt n 0)
                (set result (mul result n))
                (fact (sub n 1)))))
            (fact 5)
            result)
          0 1)",
    );
    assert_eq!(vm.stack(), &[Value::Int(120)]);
}

#[test]
fn arity_mismatch_faults() {
    let fault = run_source_fault("((fn (a b) a) 1)");
    assert_eq!(
        fault.error,
        VmError::ArityMismatch {
            expected: 2,
            got: 1
        }
    );
}

#[test]
fn calling_a_non_callable_faults() {
    let fault = run_source_fault("(1 2)");
    assert_eq!(
        fault.error,
        VmError::TypeMismatch {
            expected: "callable",
            found: "int"
        }
    );
}

#[test]
fn unbound_name_lookup_faults() {
    let fault = run_source_fault("(emit missing)");
    assert_eq!(fault.error, VmError::UnboundName("missing".to_string()));
}

#[test]
fn natives_receive_arguments_in_push_order() {
    let (vm, lines) = run_source("(emit 1 'two' 3) (sub 10 4) (concat 'a' 'b' 'c')");
    assert_eq!(lines, vec!["1 two 3"]);
    assert_eq!(
        vm.stack(),
        &[Value::Int(6), Value::String("abc".to_string())]
    );
}

#[test]
fn native_errors_become_faults() {
    let fault = run_source_fault("(div 1 0)");
    assert_eq!(fault.error, VmError::Native("division by zero".to_string()));

    let fault = run_source_fault("(add 1 'x')");
    assert_eq!(
        fault.error,
        VmError::TypeMismatch {
            expected: "int",
            found: "string"
        }
    );
}

#[test]
fn custom_native_can_push_results() {
    let mut natives = NativeRegistry::new();
    natives.register("double", |vm: &mut Vm, args: &[Value]| -> VmResult<()> {
        for arg in args {
            if let Value::Int(value) = arg {
                vm.push(Value::Int(value * 2));
            }
        }
        Ok(())
    });
    let mut vm = Vm::new(compile("(double 4 5)"), &natives);
    assert_eq!(vm.run().expect("vm should run"), VmStatus::Halted);
    assert_eq!(vm.stack(), &[Value::Int(8), Value::Int(10)]);
}

#[test]
fn let_binds_once_per_frame() {
    let (vm, _) = run_asm("1 let x $x");
    assert_eq!(vm.stack(), &[Value::Int(1)]);
    assert_eq!(vm.env().borrow().bindings().get("x"), Some(&Value::Int(1)));

    let fault = run_asm_fault("1 let x 2 let x");
    assert_eq!(fault.error, VmError::DuplicateBinding("x".to_string()));
}

#[test]
fn let_in_callee_shadows_caller_binding() {
    let (vm, _) = run_asm(
        "goto main
         .inner
             args
             2 let x
             $x
             ret
         .main
             1 let x
             fn inner ()
             $x
             ret",
    );
    assert_eq!(vm.stack(), &[Value::Int(2), Value::Int(1)]);
}

#[test]
fn set_without_binding_faults() {
    let fault = run_asm_fault("1 ->nowhere");
    assert_eq!(fault.error, VmError::UnboundName("nowhere".to_string()));
}

#[test]
fn undefined_label_faults_at_run_time() {
    let program = assemble("goto nowhere").expect("assemble should succeed");
    let (natives, _) = recording_natives();
    let mut vm = Vm::new(program, &natives);
    let fault = vm.run().expect_err("vm should fault");
    assert_eq!(fault.error, VmError::UndefinedLabel("nowhere".to_string()));
    assert_eq!(fault.pc, 0);
}

#[test]
fn stack_underflow_faults() {
    let fault = run_asm_fault("->x");
    assert_eq!(fault.error, VmError::StackUnderflow);
}

#[test]
fn args_bind_without_argument_list_is_an_arity_mismatch() {
    let fault = run_asm_fault("1 args a");
    assert_eq!(
        fault.error,
        VmError::ArityMismatch {
            expected: 1,
            got: 0
        }
    );
}

#[test]
fn truthy_jmpf_never_resolves_its_label() {
    let (vm, _) = run_asm("1 jmpf nowhere 7");
    assert_eq!(vm.stack(), &[Value::Int(7)]);
    assert!(vm.is_halted());
}

#[test]
fn falsy_jmpf_to_missing_label_faults_after_popping() {
    let fault = run_asm_fault("1 0 0 $eq (2) $not (1) jmpf nowhere");
    assert_eq!(fault.error, VmError::UndefinedLabel("nowhere".to_string()));
    assert!(fault.report.contains("\nstack:\n    1\n"));
}

#[test]
fn builtin_registry_lists_names_in_order() {
    let registry = NativeRegistry::with_builtins();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
        names,
        vec!["add", "concat", "div", "eq", "gt", "lt", "mul", "not", "print", "sub"]
    );
}

#[test]
fn tail_call_reuses_the_caller_frame() {
    let (vm, lines) = run_asm(
        "goto main
         .loop
             args n
             $n 0 $gt (2) jmpf done
             $n $emit (1)
             $n 1 $sub (2) fn loop (1)!
         .done
             ret
         .main
             3 fn loop (1)
             'liftoff' $emit (1)
             ret",
    );
    assert_eq!(lines, vec!["3", "2", "1", "liftoff"]);
    assert!(vm.stack().is_empty());
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn falling_off_the_end_halts() {
    let (vm, _) = run_asm("1 2");
    assert_eq!(vm.stack(), &[Value::Int(1), Value::Int(2)]);
    assert!(vm.is_halted());
}

#[test]
fn fault_is_remembered_across_runs() {
    let (natives, _) = recording_natives();
    let mut vm = Vm::new(compile("(emit missing)"), &natives);
    let first = vm.run().expect_err("vm should fault");
    let second = vm.resume().expect_err("fault should persist");
    assert_eq!(first, second);
    assert_eq!(vm.fault(), Some(&first));
}

#[test]
fn interrupt_pauses_and_resume_continues() {
    let (natives, transcript) = recording_natives();
    let mut vm = Vm::new(compile("(emit 'a') (emit 'b')"), &natives);
    let flag = Arc::new(AtomicBool::new(true));
    vm.set_interrupt_flag(Arc::clone(&flag));

    assert_eq!(vm.run().expect("vm should run"), VmStatus::Interrupted);
    assert_eq!(vm.pc(), 0);
    assert!(!flag.load(Ordering::SeqCst));
    assert!(transcript.borrow().is_empty());

    assert_eq!(vm.resume().expect("vm should resume"), VmStatus::Halted);
    assert_eq!(*transcript.borrow(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn interrupt_raised_by_a_native_stops_before_next_instruction() {
    let flag = Arc::new(AtomicBool::new(false));
    let (mut natives, transcript) = recording_natives();
    let raise = Arc::clone(&flag);
    natives.register("pause", move |_vm: &mut Vm, _args: &[Value]| -> VmResult<()> {
        raise.store(true, Ordering::SeqCst);
        Ok(())
    });
    let mut vm = Vm::new(compile("(pause) (emit 'after')"), &natives);
    vm.set_interrupt_flag(flag);

    assert_eq!(vm.run().expect("vm should run"), VmStatus::Interrupted);
    assert!(transcript.borrow().is_empty());
    assert_eq!(vm.resume().expect("vm should resume"), VmStatus::Halted);
    assert_eq!(*transcript.borrow(), vec!["after".to_string()]);
}

#[test]
fn halted_vm_stays_halted() {
    let (mut vm, _) = run_source("1");
    assert_eq!(vm.run().expect("vm should run"), VmStatus::Halted);
    assert_eq!(vm.stack(), &[Value::Int(1)]);
}
