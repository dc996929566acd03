use super::lexer::{Token, TokenKind};
use super::{LexError, ParseError, SourceError, Span};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SExpr {
    Atom(Token),
    List(Vec<SExpr>, Span),
}

impl SExpr {
    pub fn span(&self) -> Span {
        match self {
            SExpr::Atom(token) => token.span,
            SExpr::List(_, span) => *span,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            SExpr::Atom(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Atom(token) => write!(f, "{}", token.kind),
            SExpr::List(items, _) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Builds the top-level forms from a token stream using an explicit stack
/// of open lists.
pub fn read_forms<I>(tokens: I) -> Result<Vec<SExpr>, SourceError>
where
    I: IntoIterator<Item = Result<Token, LexError>>,
{
    let mut open: Vec<(Vec<SExpr>, usize)> = Vec::new();
    let mut active: Vec<SExpr> = Vec::new();

    for token in tokens {
        let token = token?;
        match token.kind {
            TokenKind::OpenParen => {
                open.push((std::mem::take(&mut active), token.span.lo));
            }
            TokenKind::CloseParen => {
                let Some((mut parent, lo)) = open.pop() else {
                    return Err(ParseError {
                        span: token.span,
                        message: "unmatched close".to_string(),
                    }
                    .into());
                };
                let list = SExpr::List(std::mem::take(&mut active), Span::new(lo, token.span.hi));
                parent.push(list);
                active = parent;
            }
            _ => active.push(SExpr::Atom(token)),
        }
    }

    if let Some((_, lo)) = open.last() {
        return Err(ParseError {
            span: Span::new(*lo, *lo + 1),
            message: "unclosed open paren".to_string(),
        }
        .into());
    }
    Ok(active)
}

/// Wraps top-level forms as `(do <forms...>)`.
pub fn wrap_in_do(forms: Vec<SExpr>) -> SExpr {
    let span = match (forms.first(), forms.last()) {
        (Some(first), Some(last)) => first.span().to(last.span()),
        _ => Span::default(),
    };
    let head = SExpr::Atom(Token {
        kind: TokenKind::Ident("do".to_string()),
        span: Span::new(span.lo, span.lo),
    });
    let mut items = Vec::with_capacity(forms.len() + 1);
    items.push(head);
    items.extend(forms);
    SExpr::List(items, span)
}
