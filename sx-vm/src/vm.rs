use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::bytecode::{Instruction, Program, quote_string};

mod diagnostics;
mod environment;

pub use diagnostics::render_vm_error;
pub use environment::{EnvRef, Environment, assign, lookup};

#[derive(Clone, Debug)]
pub enum Value {
    Int(i64),
    String(String),
    Bool(bool),
    Closure(Closure),
    Native(Native),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Closure(_) => "closure",
            Value::Native(_) => "native",
            Value::List(_) => "list",
        }
    }

    /// Only boolean false is falsy.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    /// Display form with string literals quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::String(value) => quote_string(value),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", items.join(", "))
            }
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(lhs), Value::Int(rhs)) => lhs == rhs,
            (Value::String(lhs), Value::String(rhs)) => lhs == rhs,
            (Value::Bool(lhs), Value::Bool(rhs)) => lhs == rhs,
            (Value::Closure(lhs), Value::Closure(rhs)) => {
                lhs.entry == rhs.entry && Rc::ptr_eq(&lhs.env, &rhs.env)
            }
            (Value::Native(lhs), Value::Native(rhs)) => Rc::ptr_eq(&lhs.function, &rhs.function),
            (Value::List(lhs), Value::List(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Closure(closure) => write!(f, "<closure @{}>", closure.entry),
            Value::Native(native) => write!(f, "<native {}>", native.name),
            Value::List(_) => write!(f, "{}", self.repr()),
        }
    }
}

/// Code entry point plus the environment that was current when the `fn`
/// reference executed. The environment is shared, never copied.
#[derive(Clone)]
pub struct Closure {
    pub entry: usize,
    pub env: EnvRef,
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

pub trait NativeFunction {
    fn call(&self, vm: &mut Vm, args: &[Value]) -> VmResult<()>;
}

impl<F> NativeFunction for F
where
    F: Fn(&mut Vm, &[Value]) -> VmResult<()>,
{
    fn call(&self, vm: &mut Vm, args: &[Value]) -> VmResult<()> {
        self(vm, args)
    }
}

#[derive(Clone)]
pub struct Native {
    pub name: Rc<str>,
    pub function: Rc<dyn NativeFunction>,
}

impl std::fmt::Debug for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Native").field("name", &self.name).finish()
    }
}

/// Host-supplied natives, installed as the root environment of a [`Vm`].
#[derive(Clone, Default)]
pub struct NativeRegistry {
    entries: BTreeMap<String, Rc<dyn NativeFunction>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` under `name`, replacing any earlier entry.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: NativeFunction + 'static,
    {
        self.entries.insert(name.into(), Rc::new(function));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn root_bindings(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|(name, function)| {
                let native = Native {
                    name: Rc::from(name.as_str()),
                    function: Rc::clone(function),
                };
                (name.clone(), Value::Native(native))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    DuplicateBinding(String),
    UnboundName(String),
    ArityMismatch {
        expected: usize,
        got: usize,
    },
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    StackUnderflow,
    UndefinedLabel(String),
    Native(String),
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::DuplicateBinding(name) => write!(f, "duplicate binding '{name}'"),
            VmError::UnboundName(name) => write!(f, "unbound name '{name}'"),
            VmError::ArityMismatch { expected, got } => {
                write!(f, "arity mismatch: expected {expected} arguments, got {got}")
            }
            VmError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            VmError::StackUnderflow => write!(f, "stack underflow"),
            VmError::UndefinedLabel(label) => write!(f, "undefined label '{label}'"),
            VmError::Native(message) => write!(f, "native error: {message}"),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

/// A fatal runtime error together with its diagnostic report.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFault {
    pub error: VmError,
    pub pc: usize,
    pub report: String,
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.report)
    }
}

impl std::error::Error for RuntimeFault {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    Halted,
    Interrupted,
}

struct Frame {
    return_pc: usize,
    env: EnvRef,
}

enum StepExecOutcome {
    Continue,
    Halted,
}

pub struct Vm {
    program: Program,
    pc: usize,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    env: EnvRef,
    interrupt: Option<Arc<AtomicBool>>,
    halted: bool,
    fault: Option<RuntimeFault>,
}

impl Vm {
    pub fn new(program: Program, natives: &NativeRegistry) -> Self {
        Self {
            program,
            pc: 0,
            stack: Vec::new(),
            frames: Vec::new(),
            env: Environment::root(natives.root_bindings()),
            interrupt: None,
            halted: false,
            fault: None,
        }
    }

    /// Polled once per dispatched instruction. Raising it makes `run` return
    /// [`VmStatus::Interrupted`]; the request is consumed and `resume`
    /// continues where execution stopped.
    pub fn set_interrupt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    pub fn run(&mut self) -> Result<VmStatus, RuntimeFault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        match self.run_internal() {
            Ok(status) => Ok(status),
            Err(error) => {
                let report = render_vm_error(self, &error);
                warn!(pc = self.pc, %error, "program run faulted");
                let fault = RuntimeFault {
                    error,
                    pc: self.pc,
                    report,
                };
                self.fault = Some(fault.clone());
                Err(fault)
            }
        }
    }

    pub fn resume(&mut self) -> Result<VmStatus, RuntimeFault> {
        self.run()
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn env(&self) -> &EnvRef {
        &self.env
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn fault(&self) -> Option<&RuntimeFault> {
        self.fault.as_ref()
    }

    fn run_internal(&mut self) -> VmResult<VmStatus> {
        loop {
            if self.halted {
                return Ok(VmStatus::Halted);
            }
            if let Some(flag) = &self.interrupt
                && flag.swap(false, Ordering::SeqCst)
            {
                debug!(pc = self.pc, "execution interrupted");
                return Ok(VmStatus::Interrupted);
            }
            if self.pc >= self.program.len() {
                self.halted = true;
                return Ok(VmStatus::Halted);
            }
            match self.step()? {
                StepExecOutcome::Continue => self.pc += 1,
                StepExecOutcome::Halted => {
                    self.halted = true;
                    return Ok(VmStatus::Halted);
                }
            }
        }
    }

    fn step(&mut self) -> VmResult<StepExecOutcome> {
        let Some(instruction) = self.program.get(self.pc).cloned() else {
            return Ok(StepExecOutcome::Halted);
        };
        trace!(pc = self.pc, %instruction, depth = self.frames.len(), "dispatch");

        match instruction {
            Instruction::Label(_) => {}
            Instruction::IntPush(value) => self.stack.push(Value::Int(value)),
            Instruction::StrPush(value) => self.stack.push(Value::String(value)),
            Instruction::FnRef(label) => {
                let entry = self.resolve_label(&label)?;
                self.stack.push(Value::Closure(Closure {
                    entry,
                    env: Rc::clone(&self.env),
                }));
            }
            Instruction::LetBind(name) => {
                let value = self.pop()?;
                self.env.borrow_mut().define(&name, value)?;
            }
            Instruction::Get(name) => {
                let value = lookup(&self.env, &name).ok_or(VmError::UnboundName(name))?;
                self.stack.push(value);
            }
            Instruction::Set(name) => {
                let value = self.pop()?;
                if assign(&self.env, &name, value).is_err() {
                    return Err(VmError::UnboundName(name));
                }
            }
            Instruction::Call { argc, tail } => self.call(argc as usize, tail)?,
            Instruction::ArgsBind(names) => {
                // A bare value means no argument list was passed at all.
                let Value::List(values) = self.pop()? else {
                    return Err(VmError::ArityMismatch {
                        expected: names.len(),
                        got: 0,
                    });
                };
                if values.len() != names.len() {
                    return Err(VmError::ArityMismatch {
                        expected: names.len(),
                        got: values.len(),
                    });
                }
                let mut env = self.env.borrow_mut();
                for (name, value) in names.iter().zip(values) {
                    env.bind(name, value);
                }
            }
            Instruction::Return => {
                let Some(frame) = self.frames.pop() else {
                    return Ok(StepExecOutcome::Halted);
                };
                debug!(
                    from = self.pc,
                    to = frame.return_pc,
                    depth = self.frames.len(),
                    "return"
                );
                self.pc = frame.return_pc;
                self.env = frame.env;
            }
            Instruction::Goto(label) => {
                self.pc = self.resolve_label(&label)?;
            }
            Instruction::JumpIfFalse(label) => {
                if self.pop()?.is_falsy() {
                    self.pc = self.resolve_label(&label)?;
                }
            }
        }
        Ok(StepExecOutcome::Continue)
    }

    fn call(&mut self, argc: usize, tail: bool) -> VmResult<()> {
        let callee = self.pop()?;
        match callee {
            Value::Closure(closure) => {
                let args = self.pop_args(argc)?;
                if !tail {
                    self.frames.push(Frame {
                        return_pc: self.pc,
                        env: Rc::clone(&self.env),
                    });
                }
                debug!(
                    entry = closure.entry,
                    argc,
                    tail,
                    depth = self.frames.len(),
                    "call closure"
                );
                self.env = Environment::child(&closure.env);
                self.stack.push(Value::List(args));
                self.pc = closure.entry;
                Ok(())
            }
            Value::Native(native) => {
                let args = self.pop_args(argc)?;
                debug!(name = %native.name, argc, "call native");
                native.function.call(self, &args)
            }
            other => Err(VmError::TypeMismatch {
                expected: "callable",
                found: other.type_name(),
            }),
        }
    }

    /// Pops `argc` values, returned in their original push order.
    fn pop_args(&mut self, argc: usize) -> VmResult<Vec<Value>> {
        let len = self.stack.len();
        if len < argc {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.stack.split_off(len - argc))
    }

    fn resolve_label(&self, label: &str) -> VmResult<usize> {
        self.program
            .label_index(label)
            .ok_or_else(|| VmError::UndefinedLabel(label.to_string()))
    }
}
