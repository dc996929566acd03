pub mod assembler;
pub mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod logging;
pub mod vm;
pub mod wire;

pub use assembler::{AsmParseError, assemble, parse_text, render_text};
pub use builtins::register_builtins;
pub use bytecode::{AssemblyError, Instruction, Program};
pub use compiler::diagnostics::render_source_error;
pub use compiler::{
    CompileError, CompileErrorKind, CompiledProgram, FunctionDef, LabelAllocator, LexError, Node,
    ParseError, SExpr, SourceError, SourcePathError, Span, Token, TokenKind, assemble_program,
    collect_functions, compile_source, compile_source_file, lex, read_forms,
};
pub use vm::{
    Closure, EnvRef, Environment, Native, NativeFunction, NativeRegistry, RuntimeFault, Value, Vm,
    VmError, VmResult, VmStatus, render_vm_error,
};
pub use wire::{WireError, encode_instructions};
