use std::path::{Path, PathBuf};

use tracing::debug;

use crate::bytecode::{AssemblyError, Program};
use crate::vm::{NativeRegistry, Vm};

pub mod ast;
mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod reader;

pub use ast::{FunctionDef, LabelAllocator, Node};
pub use codegen::{assemble_program, collect_functions};
pub use lexer::{Lexer, Token, TokenKind, lex};
pub use reader::{SExpr, read_forms};

/// Byte range into the source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub hi: usize,
}

impl Span {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub remainder: String,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let near: String = self.remainder.chars().take(50).collect();
        write!(f, "no token matches at offset {}: '{near}'", self.offset)
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileErrorKind {
    EmptyForm,
    MalformedSet(&'static str),
    MalformedWhen(&'static str),
    MalformedFn(&'static str),
    DuplicateParameter(String),
    CallArityOverflow(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub span: Span,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub(crate) fn new(span: Span, kind: CompileErrorKind) -> Self {
        Self { span, kind }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            CompileErrorKind::EmptyForm => write!(f, "empty form"),
            CompileErrorKind::MalformedSet(detail) => write!(f, "malformed set: {detail}"),
            CompileErrorKind::MalformedWhen(detail) => write!(f, "malformed when: {detail}"),
            CompileErrorKind::MalformedFn(detail) => write!(f, "malformed fn: {detail}"),
            CompileErrorKind::DuplicateParameter(name) => {
                write!(f, "duplicate parameter '{name}'")
            }
            CompileErrorKind::CallArityOverflow(count) => {
                write!(f, "call has {count} arguments, at most 255 are supported")
            }
        }
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug)]
pub enum SourceError {
    Lex(LexError),
    Parse(ParseError),
    Compile(CompileError),
    Assembly(AssemblyError),
}

impl SourceError {
    pub fn span(&self) -> Option<Span> {
        match self {
            SourceError::Lex(err) => Some(Span::new(err.offset, err.offset + 1)),
            SourceError::Parse(err) => Some(err.span),
            SourceError::Compile(err) => Some(err.span),
            SourceError::Assembly(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SourceError::Lex(_) => "E_LEX",
            SourceError::Parse(_) => "E_PARSE",
            SourceError::Compile(_) => "E_COMPILE",
            SourceError::Assembly(_) => "E_ASM",
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Lex(err) => write!(f, "lex error: {err}"),
            SourceError::Parse(err) => write!(f, "parse error: {err}"),
            SourceError::Compile(err) => write!(f, "compile error: {err}"),
            SourceError::Assembly(err) => write!(f, "assembly error: {err}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<LexError> for SourceError {
    fn from(value: LexError) -> Self {
        SourceError::Lex(value)
    }
}

impl From<ParseError> for SourceError {
    fn from(value: ParseError) -> Self {
        SourceError::Parse(value)
    }
}

impl From<CompileError> for SourceError {
    fn from(value: CompileError) -> Self {
        SourceError::Compile(value)
    }
}

impl From<AssemblyError> for SourceError {
    fn from(value: AssemblyError) -> Self {
        SourceError::Assembly(value)
    }
}

#[derive(Debug)]
pub enum SourcePathError {
    Io(PathBuf, std::io::Error),
    Source(SourceError),
}

impl std::fmt::Display for SourcePathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourcePathError::Io(path, err) => write!(f, "{}: {err}", path.display()),
            SourcePathError::Source(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SourcePathError {}

impl From<SourceError> for SourcePathError {
    fn from(value: SourceError) -> Self {
        SourcePathError::Source(value)
    }
}

#[derive(Debug)]
pub struct CompiledProgram {
    pub ast: Node,
    pub program: Program,
}

impl CompiledProgram {
    pub fn into_vm(self, natives: &NativeRegistry) -> Vm {
        Vm::new(self.program, natives)
    }
}

/// Compiles source text; top-level forms run in sequence as if wrapped in `(do ...)`.
pub fn compile_source(source: &str) -> Result<CompiledProgram, SourceError> {
    let forms = read_forms(lex(source))?;
    let root = reader::wrap_in_do(forms);

    let mut labels = LabelAllocator::new();
    let ast = ast::parse(&root, &mut labels)?;
    let program = assemble_program(&ast)?;
    debug!(
        instructions = program.len(),
        functions = labels.functions_allocated(),
        "assembled program"
    );
    Ok(CompiledProgram { ast, program })
}

pub fn compile_source_file(path: impl AsRef<Path>) -> Result<CompiledProgram, SourcePathError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .map_err(|err| SourcePathError::Io(path.to_path_buf(), err))?;
    debug!(path = %path.display(), bytes = source.len(), "compiling source file");
    Ok(compile_source(&source)?)
}
