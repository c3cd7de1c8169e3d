//! Developer tool: dump the token stream and AST for source on stdin.
//!
//! ```text
//! cat pack.tbl | cargo run -p rolltable-dsl --bin trace_parser
//! ```

use rolltable_dsl::{parse_expression, parse_file, Lexer};
use std::io::Read;

fn main() {
    let mut source = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut source) {
        eprintln!("cannot read stdin: {}", err);
        std::process::exit(1);
    }

    println!("=== tokens ===");
    for token in Lexer::new(&source).tokenize() {
        println!(
            "{:>4}:{:<3} {:?}",
            token.span.line, token.span.column, token.kind
        );
    }

    // A leading brace means the input is a lone expression.
    let trimmed = source.trim_start();
    println!("=== ast ===");
    if trimmed.starts_with('{') {
        match parse_expression(&source) {
            Ok(ast) => println!("{:#?}", ast),
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
    } else {
        match parse_file(&source) {
            Ok(ast) => println!("{:#?}", ast),
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
    }
}
