mod ast;
mod lexer;
mod parser;
mod stream;
mod table;
mod token;

pub use ast::*;
pub use lexer::tokenize;
pub use parser::Parser;
pub use stream::TokenStream;
pub use table::{ParseTable, REFERENCE_MARKER};
pub use token::{Token, TokenKind};
