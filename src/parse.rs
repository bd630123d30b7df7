use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use miette::{Diagnostic, Error, LabeledSpan, NamedSource, SourceSpan, miette};
use thiserror::Error;

use crate::{
    Lexer,
    lex::{Token, TokenKind},
};

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected end of file")]
#[diagnostic(help("the input ended before this form was closed"))]
pub struct Eof {
    #[source_code]
    src: NamedSource<String>,

    #[label("Syntax Error: Unexpected end of file")]
    bad_line: SourceSpan,
}

impl Eof {
    pub fn build(parser: &Parser<'_>) -> Self {
        Eof {
            src: NamedSource::new(
                parser.filename.unwrap_or("<input>"),
                parser.whole.to_string(),
            ),
            bad_line: SourceSpan::from(
                parser.whole.len().saturating_sub(1)..parser.whole.len(),
            ),
        }
    }

    pub fn offset(&self) -> usize {
        self.bad_line.offset()
    }

    pub fn line(&self) -> usize {
        self.src.inner()[..=self.bad_line.offset()].lines().count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ast<'de> {
    Term { name: &'de str, args: Vec<Ast<'de>> },
    Identifier(&'de str),
    NumberLiteral(BigDecimal),
    StringLiteral(Cow<'de, str>),
}

impl Display for Ast<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ast::Term { name, args } => {
                write!(f, "({name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Ast::Identifier(name) => write!(f, "{name}"),
            Ast::NumberLiteral(n) => write!(f, "{n}"),
            Ast::StringLiteral(s) => write!(f, "\"{s}\""),
        }
    }
}

pub struct Parser<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    tokens: Vec<Token<'de>>,
    index: usize,
}

impl<'de> Parser<'de> {
    /// Lexes the whole input up front; lexing failures surface here.
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Result<Self, Error> {
        let tokens = Lexer::new(filename, whole).collect::<Result<Vec<_>, _>>()?;
        Ok(Parser {
            filename,
            whole,
            tokens,
            index: 0,
        })
    }

    /// Parses top-level nodes until the token stream is exhausted and wraps
    /// them in a `source` term. The `source` name has no binding in the
    /// standard library; it is a container for the driver to unpack.
    pub fn parse(mut self) -> Result<Ast<'de>, Error> {
        let mut args = Vec::new();
        while self.peek().is_some() {
            args.push(self.parse_node()?);
        }
        Ok(Ast::Term {
            name: "source",
            args,
        })
    }

    fn peek(&self) -> Option<&Token<'de>> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token<'de>> {
        let token = self.tokens.get(self.index).copied();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, len: usize, message: &str) -> Error {
        miette!(
            labels = vec![LabeledSpan::at(offset..offset + len.max(1), "here")],
            "{message}",
        )
        .with_source_code(self.whole.to_string())
    }

    fn parse_node(&mut self) -> Result<Ast<'de>, Error> {
        let Some(token) = self.peek().copied() else {
            return Err(Eof::build(self).into());
        };
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = BigDecimal::from_str(token.literal).map_err(|e| {
                    miette!(
                        labels = vec![LabeledSpan::at(
                            token.offset..token.offset + token.literal.len(),
                            "this numeric literal"
                        )],
                        "{e}",
                    )
                    .with_source_code(self.whole.to_string())
                })?;
                Ok(Ast::NumberLiteral(value))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Ast::Identifier(token.literal))
            }
            TokenKind::String => {
                self.advance();
                let inner = &token.literal[1..token.literal.len() - 1];
                Ok(Ast::StringLiteral(unescape(inner)))
            }
            TokenKind::Operator => self.parse_term(),
        }
    }

    fn parse_term(&mut self) -> Result<Ast<'de>, Error> {
        let Some(open) = self.advance() else {
            return Err(Eof::build(self).into());
        };
        if !(open.kind == TokenKind::Operator && matches!(open.literal, "(" | "[")) {
            return Err(self.error_at(
                open.offset,
                open.literal.len(),
                "expected `(` or `[` to open a term",
            ));
        }
        let name = match self.advance() {
            Some(Token {
                kind: TokenKind::Identifier,
                literal,
                ..
            }) => literal,
            Some(token) => {
                return Err(self.error_at(
                    token.offset,
                    token.literal.len(),
                    "expected an identifier to name this term",
                ));
            }
            None => return Err(Eof::build(self).into()),
        };
        let mut args = Vec::new();
        loop {
            match self.peek() {
                // opening and closing bracket kinds are deliberately
                // interchangeable: `(` may be closed by `]`
                Some(token)
                    if token.kind == TokenKind::Operator
                        && matches!(token.literal, ")" | "]") =>
                {
                    self.advance();
                    return Ok(Ast::Term { name, args });
                }
                Some(_) => args.push(self.parse_node()?),
                None => return Err(Eof::build(self).into()),
            }
        }
    }
}

/// Decodes the escape sequences of a string literal's body. The lexer has
/// already rejected everything outside the recognized set.
fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{0008}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(c) => out.push(c),
            None => {}
        }
    }
    Cow::Owned(out)
}
