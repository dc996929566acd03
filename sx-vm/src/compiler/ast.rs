use std::collections::HashSet;

use super::lexer::TokenKind;
use super::reader::SExpr;
use super::{CompileError, CompileErrorKind};
use crate::bytecode::quote_string;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Int(i64),
    Str(String),
    Ident(String),
    Do(Vec<Node>),
    When {
        cond: Box<Node>,
        body: Vec<Node>,
        label: String,
    },
    Set {
        name: String,
        value: Box<Node>,
    },
    Fn(FunctionDef),
    Call {
        op: Box<Node>,
        args: Vec<Node>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    pub label: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

/// Hands out the unique labels for `fn` and `when` nodes of one compilation.
#[derive(Clone, Debug, Default)]
pub struct LabelAllocator {
    next_fn: usize,
    next_when: usize,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fn_label(&mut self) -> String {
        let label = format!("f{}", self.next_fn);
        self.next_fn += 1;
        label
    }

    pub fn when_label(&mut self) -> String {
        let label = format!("w{}", self.next_when);
        self.next_when += 1;
        label
    }

    pub fn functions_allocated(&self) -> usize {
        self.next_fn
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpecialForm {
    Do,
    When,
    Set,
    Fn,
}

impl SpecialForm {
    fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "do" => Some(SpecialForm::Do),
            "when" => Some(SpecialForm::When),
            "set" => Some(SpecialForm::Set),
            "fn" => Some(SpecialForm::Fn),
            _ => None,
        }
    }
}

pub fn parse(expr: &SExpr, labels: &mut LabelAllocator) -> Result<Node, CompileError> {
    let (items, span) = match expr {
        SExpr::Atom(token) => {
            return Ok(match &token.kind {
                TokenKind::Integer(value) => Node::Int(*value),
                TokenKind::Str(value) => Node::Str(value.clone()),
                TokenKind::Ident(name) => Node::Ident(name.clone()),
                // The reader never yields bare parens as atoms.
                TokenKind::OpenParen | TokenKind::CloseParen => {
                    return Err(CompileError::new(token.span, CompileErrorKind::EmptyForm));
                }
            });
        }
        SExpr::List(items, span) => (items, *span),
    };

    let Some(head) = items.first() else {
        return Err(CompileError::new(span, CompileErrorKind::EmptyForm));
    };
    let rest = &items[1..];

    match head.as_ident().and_then(SpecialForm::from_keyword) {
        Some(SpecialForm::Do) => Ok(Node::Do(parse_all(rest, labels)?)),
        Some(SpecialForm::When) => {
            let Some((cond, body)) = rest.split_first() else {
                return Err(CompileError::new(
                    span,
                    CompileErrorKind::MalformedWhen("expected (when COND BODY...)"),
                ));
            };
            let label = labels.when_label();
            Ok(Node::When {
                cond: Box::new(parse(cond, labels)?),
                body: parse_all(body, labels)?,
                label,
            })
        }
        Some(SpecialForm::Set) => {
            let [target, value] = rest else {
                return Err(CompileError::new(
                    span,
                    CompileErrorKind::MalformedSet("expected (set NAME VALUE)"),
                ));
            };
            let Some(name) = target.as_ident() else {
                return Err(CompileError::new(
                    target.span(),
                    CompileErrorKind::MalformedSet("target must be an identifier"),
                ));
            };
            Ok(Node::Set {
                name: name.to_string(),
                value: Box::new(parse(value, labels)?),
            })
        }
        Some(SpecialForm::Fn) => {
            let Some((params, body)) = rest.split_first() else {
                return Err(CompileError::new(
                    span,
                    CompileErrorKind::MalformedFn("expected (fn (PARAMS...) BODY...)"),
                ));
            };
            let params = parse_params(params)?;
            let label = labels.fn_label();
            Ok(Node::Fn(FunctionDef {
                label,
                params,
                body: parse_all(body, labels)?,
            }))
        }
        None => {
            if rest.len() > u8::MAX as usize {
                return Err(CompileError::new(
                    span,
                    CompileErrorKind::CallArityOverflow(rest.len()),
                ));
            }
            Ok(Node::Call {
                op: Box::new(parse(head, labels)?),
                args: parse_all(rest, labels)?,
            })
        }
    }
}

fn parse_all(exprs: &[SExpr], labels: &mut LabelAllocator) -> Result<Vec<Node>, CompileError> {
    exprs.iter().map(|expr| parse(expr, labels)).collect()
}

fn parse_params(expr: &SExpr) -> Result<Vec<String>, CompileError> {
    let SExpr::List(items, _) = expr else {
        return Err(CompileError::new(
            expr.span(),
            CompileErrorKind::MalformedFn("parameters must be a list"),
        ));
    };
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(items.len());
    for item in items {
        let Some(name) = item.as_ident() else {
            return Err(CompileError::new(
                item.span(),
                CompileErrorKind::MalformedFn("parameter must be an identifier"),
            ));
        };
        if !seen.insert(name) {
            return Err(CompileError::new(
                item.span(),
                CompileErrorKind::DuplicateParameter(name.to_string()),
            ));
        }
        params.push(name.to_string());
    }
    Ok(params)
}

fn write_seq(f: &mut std::fmt::Formatter<'_>, nodes: &[Node]) -> std::fmt::Result {
    for node in nodes {
        write!(f, " {node}")?;
    }
    Ok(())
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Int(value) => write!(f, "{value}"),
            Node::Str(value) => write!(f, "{}", quote_string(value)),
            Node::Ident(name) => write!(f, "{name}"),
            Node::Do(body) => {
                write!(f, "(do")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Node::When { cond, body, .. } => {
                write!(f, "(when {cond}")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Node::Set { name, value } => write!(f, "(set {name} {value})"),
            Node::Fn(def) => {
                write!(f, "(fn ({})", def.params.join(" "))?;
                write_seq(f, &def.body)?;
                write!(f, ")")
            }
            Node::Call { op, args } => {
                write!(f, "({op}")?;
                write_seq(f, args)?;
                write!(f, ")")
            }
        }
    }
}
