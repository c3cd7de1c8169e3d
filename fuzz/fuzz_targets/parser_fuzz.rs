//! Fuzz target for the table-language parser.
//!
//! Parsing arbitrary input must either produce an AST or a positioned
//! error, never a panic.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use rolltable_dsl::{parse_expression, parse_file, parse_row, parse_table};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        for result in [
            parse_file(input).map(|_| ()),
            parse_table(input).map(|_| ()),
            parse_row(input).map(|_| ()),
            parse_expression(input).map(|_| ()),
        ] {
            if let Err(err) = result {
                assert!(err.line >= 1, "error line should be >= 1");
                assert!(err.column >= 1, "error column should be >= 1");
                assert!(!err.message.is_empty(), "error message should not be empty");
            }
        }
    }
});
