use std::collections::HashSet;

use super::ast::{FunctionDef, Node};
use crate::bytecode::{AssemblyError, Instruction, Program};

pub(crate) const ENTRY_LABEL: &str = "main";

impl Node {
    /// Instructions for evaluating this node in place. Function bodies are
    /// emitted separately by [`assemble_program`].
    pub fn compile(&self) -> Result<Vec<Instruction>, AssemblyError> {
        let mut out = Vec::new();
        self.compile_into(&mut out)?;
        Ok(out)
    }

    fn compile_into(&self, out: &mut Vec<Instruction>) -> Result<(), AssemblyError> {
        match self {
            Node::Int(value) => out.push(Instruction::IntPush(*value)),
            Node::Str(value) => out.push(Instruction::StrPush(value.clone())),
            Node::Ident(name) => out.push(Instruction::Get(name.clone())),
            Node::Do(body) => compile_seq(body, out)?,
            Node::When { cond, body, label } => {
                cond.compile_into(out)?;
                out.push(Instruction::JumpIfFalse(label.clone()));
                compile_seq(body, out)?;
                out.push(Instruction::Label(label.clone()));
            }
            Node::Set { name, value } => {
                value.compile_into(out)?;
                out.push(Instruction::Set(name.clone()));
            }
            Node::Fn(def) => out.push(Instruction::FnRef(def.label.clone())),
            Node::Call { op, args } => {
                // Parsed calls are already capped; hand-built nodes are not.
                let argc = u8::try_from(args.len())
                    .map_err(|_| AssemblyError::CallArityOverflow(args.len()))?;
                compile_seq(args, out)?;
                op.compile_into(out)?;
                out.push(Instruction::Call { argc, tail: false });
            }
        }
        Ok(())
    }

    fn collect_functions<'a>(&'a self, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a FunctionDef>) {
        match self {
            Node::Int(_) | Node::Str(_) | Node::Ident(_) => {}
            Node::Do(body) => collect_seq(body, seen, out),
            Node::When { cond, body, .. } => {
                cond.collect_functions(seen, out);
                collect_seq(body, seen, out);
            }
            Node::Set { value, .. } => value.collect_functions(seen, out),
            Node::Fn(def) => {
                if seen.insert(def.label.as_str()) {
                    out.push(def);
                }
                collect_seq(&def.body, seen, out);
            }
            Node::Call { op, args } => {
                op.collect_functions(seen, out);
                collect_seq(args, seen, out);
            }
        }
    }
}

impl FunctionDef {
    /// `[Label, ArgsBind, body..., Return]`, emitted once per function.
    pub fn compile_body(&self) -> Result<Vec<Instruction>, AssemblyError> {
        let mut out = vec![
            Instruction::Label(self.label.clone()),
            Instruction::ArgsBind(self.params.clone()),
        ];
        compile_seq(&self.body, &mut out)?;
        out.push(Instruction::Return);
        Ok(out)
    }
}

fn compile_seq(nodes: &[Node], out: &mut Vec<Instruction>) -> Result<(), AssemblyError> {
    for node in nodes {
        node.compile_into(out)?;
    }
    Ok(())
}

fn collect_seq<'a>(nodes: &'a [Node], seen: &mut HashSet<&'a str>, out: &mut Vec<&'a FunctionDef>) {
    for node in nodes {
        node.collect_functions(seen, out);
    }
}

/// Every function definition reachable from `root`, depth first, each once.
pub fn collect_functions(root: &Node) -> Vec<&FunctionDef> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    root.collect_functions(&mut seen, &mut out);
    out
}

/// Lays out `goto main`, all function bodies, `.main`, the top-level code and
/// a final `ret`.
pub fn assemble_program(root: &Node) -> Result<Program, AssemblyError> {
    let mut instructions = vec![Instruction::Goto(ENTRY_LABEL.to_string())];
    for function in collect_functions(root) {
        instructions.extend(function.compile_body()?);
    }
    instructions.push(Instruction::Label(ENTRY_LABEL.to_string()));
    root.compile_into(&mut instructions)?;
    instructions.push(Instruction::Return);
    Program::new(instructions)
}
