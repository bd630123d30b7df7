pub mod eval;
pub mod lex;
pub mod parse;
pub mod system;

pub use eval::{Builtin, Interpreter, Scope, Value};
pub use lex::{Lexer, Token, TokenKind};
pub use parse::{Ast, Parser};
