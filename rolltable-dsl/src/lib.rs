//! Rolltable DSL - language front end
//!
//! Lexer, parser, and multi-pack compiler for the table language.
//!
//! Architecture:
//! ```text
//! Source (.tbl file)
//!     ↓
//! Lexer (stateful mode stack: Root / Expr / Call / Roll)
//!     ↓
//! Parser (recursive descent → AST)
//!     ↓
//! Compiler (link imports by content hash, lower to Evaluable tree)
//!     ↓
//! rolltable_engine::Program
//! ```

pub mod compiler;
pub mod lexer;
pub mod parser;
pub mod pretty_printer;

pub use compiler::*;
pub use lexer::*;
pub use parser::*;
