use std::collections::BTreeMap;

use super::{Vm, VmError};
use crate::assembler::render_text;

const NEAR_INSTRUCTIONS: usize = 5;
const INDENT: &str = "    ";

/// Fault report: error, the instructions at the faulting pc, the operand
/// stack (top first) and the current frame's own bindings.
pub fn render_vm_error(vm: &Vm, err: &VmError) -> String {
    let pc = vm.pc();
    let mut out = format!("runtime error: {err}\nat pc {pc}");

    out.push_str("\nnear:\n");
    let instructions = vm.program().instructions();
    let start = pc.min(instructions.len());
    let end = (start + NEAR_INSTRUCTIONS).min(instructions.len());
    let listing = render_text(&instructions[start..end], false);
    if listing.is_empty() {
        out.push_str(&format!("{INDENT}* end of program *"));
    } else {
        out.push_str(&indent(&listing));
    }

    out.push_str("\nstack:\n");
    if vm.stack().is_empty() {
        out.push_str(&format!("{INDENT}* empty *"));
    } else {
        let lines: Vec<String> = vm.stack().iter().rev().map(|value| value.repr()).collect();
        out.push_str(&indent(&lines.join("\n")));
    }

    out.push_str("\nenvironment:\n");
    let env = vm.env().borrow();
    let mut lines: Vec<String> = env
        .bindings()
        .iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(name, value)| format!("{name} = {}", value.repr()))
        .collect();
    if env.parent().is_some() {
        lines.push("*parent* = {...}".to_string());
    }
    if lines.is_empty() {
        out.push_str(&format!("{INDENT}* empty *"));
    } else {
        out.push_str(&indent(&lines.join("\n")));
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("{INDENT}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
