//! Property tests: the front end is total over arbitrary input.

use proptest::prelude::*;
use rolltable_dsl::{parse_expression, parse_file, Lexer, TokenKind};

proptest! {
    /// Tokenizing never panics, always ends with Eof, and every span is
    /// sane.
    #[test]
    fn lexer_is_total(input in ".*") {
        let tokens = Lexer::new(&input).tokenize();
        prop_assert!(!tokens.is_empty());
        prop_assert_eq!(&tokens.last().unwrap().kind, &TokenKind::Eof);
        for token in &tokens {
            prop_assert!(token.span.start <= token.span.end);
            prop_assert!(token.span.line >= 1);
            prop_assert!(token.span.column >= 1);
        }
    }

    /// Parsing never panics; failures are positioned errors.
    #[test]
    fn parser_is_total(input in ".*") {
        match parse_file(&input) {
            Ok(_) => {}
            Err(err) => {
                prop_assert!(err.line >= 1);
                prop_assert!(err.column >= 1);
                prop_assert!(!err.message.is_empty());
            }
        }
        let _ = parse_expression(&input);
    }

    /// Any well-formed single-row table parses, whatever the row text.
    #[test]
    fn simple_tables_always_parse(text in "[a-zA-Z0-9 ]{1,24}") {
        let source = format!("TablePack: p\nTableDef: t\n\"{}\"\n", text);
        let file = parse_file(&source).unwrap();
        prop_assert_eq!(file.tables.len(), 1);
    }
}
