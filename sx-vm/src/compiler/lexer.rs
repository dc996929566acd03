use std::sync::LazyLock;

use regex::Regex;

use super::{LexError, Span};
use crate::bytecode::unescape_string;

static SKIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\s+|;[^\n]*)").expect("skip pattern should compile"));
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+").expect("integer pattern should compile"));
static STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^'((?:[^'\\]|\\.)*)'").expect("string pattern should compile")
});
static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+").expect("identifier pattern should compile"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Integer(i64),
    Str(String),
    Ident(String),
    OpenParen,
    CloseParen,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Integer(value) => write!(f, "{value}"),
            TokenKind::Str(value) => write!(f, "{}", crate::bytecode::quote_string(value)),
            TokenKind::Ident(name) => write!(f, "{name}"),
            TokenKind::OpenParen => write!(f, "("),
            TokenKind::CloseParen => write!(f, ")"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Lazy token stream. Yields at most one error, after which it is exhausted.
pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    done: bool,
}

pub fn lex(source: &str) -> Lexer<'_> {
    Lexer {
        source,
        pos: 0,
        done: false,
    }
}

impl<'src> Lexer<'src> {
    fn skip_trivia(&mut self) {
        while let Some(found) = SKIP.find(&self.source[self.pos..]) {
            self.pos += found.end();
        }
    }

    fn fail(&mut self) -> LexError {
        self.done = true;
        LexError {
            offset: self.pos,
            remainder: self.source[self.pos..].to_string(),
        }
    }

    // Patterns are tried in priority order; the first match wins.
    fn next_token(&mut self) -> Result<Token, LexError> {
        let rest = &self.source[self.pos..];
        let lo = self.pos;

        let (kind, len) = if let Some(found) = INTEGER.find(rest) {
            let Ok(value) = found.as_str().parse::<i64>() else {
                return Err(self.fail());
            };
            (TokenKind::Integer(value), found.end())
        } else if let Some(caps) = STRING.captures(rest) {
            (TokenKind::Str(unescape_string(&caps[1])), caps[0].len())
        } else if let Some(found) = IDENT.find(rest) {
            (TokenKind::Ident(found.as_str().to_string()), found.end())
        } else if rest.starts_with('(') {
            (TokenKind::OpenParen, 1)
        } else if rest.starts_with(')') {
            (TokenKind::CloseParen, 1)
        } else {
            return Err(self.fail());
        };

        self.pos += len;
        Ok(Token {
            kind,
            span: Span::new(lo, self.pos),
        })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.skip_trivia();
        if self.pos >= self.source.len() {
            self.done = true;
            return None;
        }
        Some(self.next_token())
    }
}
