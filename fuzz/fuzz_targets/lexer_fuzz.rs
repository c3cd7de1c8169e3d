//! Fuzz target for the table-language lexer.
//!
//! The lexer must be total: any UTF-8 input tokenizes without panicking,
//! the stream ends with `Eof`, and every span is positionally sane.
//!
//! Run with: cargo +nightly fuzz run lexer_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rolltable_dsl::{Lexer, TokenKind};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let tokens = Lexer::new(input).tokenize();

        assert!(!tokens.is_empty(), "tokenization should produce at least Eof");
        assert_eq!(
            tokens.last().unwrap().kind,
            TokenKind::Eof,
            "last token should always be Eof"
        );

        for token in &tokens {
            assert!(token.span.start <= token.span.end, "span start should be <= end");
            assert!(token.span.line >= 1, "line numbers should be >= 1");
            assert!(token.span.column >= 1, "column numbers should be >= 1");
        }
    }
});
