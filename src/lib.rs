pub mod ast;
pub mod diagnostics;
pub mod domain;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod symtab;
pub mod token;
pub mod value;
