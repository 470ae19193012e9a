//! Query-string expression language: lexer, recursive-descent parser and
//! compiler into backend-neutral query terms.

mod ast;
mod compile;
mod lexer;
mod parser;

pub use ast::{BoolOp, Expr, Literal, Operator, Sign};
pub use compile::{compile, compile_filter, compile_projection, compile_sort, Term};
pub use parser::{parse, ParseError};
