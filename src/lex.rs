use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("unterminated double quote string")]
#[diagnostic(help("add a closing `\"` before the end of the input"))]
pub struct StringTerminationError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this string literal is never closed")]
    bad_line: SourceSpan,
}

impl StringTerminationError {
    pub fn offset(&self) -> usize {
        self.bad_line.offset()
    }

    pub fn line(&self) -> usize {
        self.src.inner()[..=self.bad_line.offset()].lines().count()
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("invalid escape sequence '\\{escape}'")]
#[diagnostic(help("the recognized escapes are \\b \\n \\r \\t \\' \\\" and \\\\"))]
pub struct InvalidEscapeError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this escape")]
    bad_bit: SourceSpan,

    pub escape: char,
}

impl InvalidEscapeError {
    pub fn offset(&self) -> usize {
        self.bad_bit.offset()
    }

    pub fn line(&self) -> usize {
        self.src.inner()[..=self.bad_bit.offset()].lines().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Operator,
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        let at = self.offset;
        match self.kind {
            TokenKind::Identifier => write!(f, "IDENTIFIER {lit} {at}"),
            TokenKind::Number => write!(f, "NUMBER {lit} {at}"),
            TokenKind::String => write!(f, "STRING {lit} {at}"),
            TokenKind::Operator => write!(f, "OPERATOR {lit} {at}"),
        }
    }
}

/// Identifiers may begin with a letter, an underscore, or one of the symbol
/// characters that name builtin operators.
fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic()
        || matches!(
            c,
            '_' | '+' | '-' | '*' | '/' | ':' | '!' | '?' | '<' | '>' | '='
        )
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '_' | '.' | '+' | '-' | '*' | '/' | ':' | '!' | '?' | '<' | '>' | '='
        )
}

pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
        }
    }

    pub fn lex(input: &'de str) -> Result<Vec<Token<'de>>, Error> {
        Lexer::new(None, input).collect()
    }

    fn source(&self) -> NamedSource<String> {
        NamedSource::new(self.filename.unwrap_or("<input>"), self.whole.to_string())
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let at = self.byte;
            let literal = &self.rest[..c.len_utf8()];
            let cur = self.rest;
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                String,
                Identifier,
                Number,
            }

            // A signed or unsigned digit is always a number; a leading quote is
            // always a string. Everything else that does not start an
            // identifier is a one-character operator token.
            let started = match c {
                ' ' | '\t' | '\n' | '\r' | '\u{0008}' => continue,
                '"' => Start::String,
                '0'..='9' => Start::Number,
                '+' | '-' if self.rest.starts_with(|c: char| c.is_ascii_digit()) => Start::Number,
                c if is_identifier_start(c) => Start::Identifier,
                '.' if self.rest.starts_with(is_identifier_continue) => Start::Identifier,
                _ => {
                    return Some(Ok(Token {
                        kind: TokenKind::Operator,
                        literal,
                        offset: at,
                    }));
                }
            };

            match started {
                Start::String => {
                    let mut inner = self.rest.char_indices();
                    loop {
                        let Some((i, sc)) = inner.next() else {
                            return Some(Err(StringTerminationError {
                                src: self.source(),
                                bad_line: SourceSpan::from(at..self.whole.len()),
                            }
                            .into()));
                        };
                        match sc {
                            '"' => {
                                let literal = &cur[..c.len_utf8() + i + 1];
                                let extra_bytes = literal.len() - c.len_utf8();
                                self.byte += extra_bytes;
                                self.rest = &self.rest[extra_bytes..];
                                return Some(Ok(Token {
                                    kind: TokenKind::String,
                                    literal,
                                    offset: at,
                                }));
                            }
                            '\\' => match inner.next() {
                                Some((_, 'b' | 'n' | 'r' | 't' | '\'' | '"' | '\\')) => {}
                                Some((j, esc)) => {
                                    return Some(Err(InvalidEscapeError {
                                        src: self.source(),
                                        bad_bit: SourceSpan::from(
                                            at + 1 + i..at + 1 + j + esc.len_utf8(),
                                        ),
                                        escape: esc,
                                    }
                                    .into()));
                                }
                                None => {
                                    return Some(Err(StringTerminationError {
                                        src: self.source(),
                                        bad_line: SourceSpan::from(at..self.whole.len()),
                                    }
                                    .into()));
                                }
                            },
                            _ => {}
                        }
                    }
                }
                Start::Identifier => {
                    let first_non_ident = cur
                        .find(|c| !is_identifier_continue(c))
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_ident];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    return Some(Ok(Token {
                        kind: TokenKind::Identifier,
                        literal,
                        offset: at,
                    }));
                }
                Start::Number => {
                    let first_non_digit = cur[c.len_utf8()..]
                        .find(|c: char| !c.is_ascii_digit())
                        .map(|i| i + c.len_utf8())
                        .unwrap_or(cur.len());

                    let mut literal = &cur[..first_non_digit];

                    // at most one decimal point, and only when a digit follows
                    let after = &cur[literal.len()..];
                    if let Some(frac) = after.strip_prefix('.') {
                        let digits = frac
                            .find(|c: char| !c.is_ascii_digit())
                            .unwrap_or(frac.len());
                        if digits > 0 {
                            literal = &cur[..literal.len() + 1 + digits];
                        }
                    }

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    return Some(Ok(Token {
                        kind: TokenKind::Number,
                        literal,
                        offset: at,
                    }));
                }
            }
        }
    }
}
