//! Table call modes through the full pipeline.

use rolltable_core::{push_samples, ExpressionResult, QueueRandom};
use rolltable_dsl::{compile_expression, Compiler};
use rolltable_engine::Program;
use std::sync::{Arc, Mutex};

fn program_from(source: &str) -> (Program, Arc<Mutex<QueueRandom>>) {
    let mut program = Compiler::new().compile_source(source).expect("compile");
    let (rng, handle) = QueueRandom::shared([]);
    program.set_random(rng);
    (program, handle)
}

fn eval(program: &Program, source: &str) -> ExpressionResult {
    let expr = compile_expression(source, program).expect("compile expression");
    program.eval(&expr).expect("eval")
}

fn eval_err(program: &Program, source: &str) -> String {
    let expr = compile_expression(source, program).expect("compile expression");
    program.eval(&expr).expect_err("expected error").to_string()
}

const MIXED_TABLE: &str = "TablePack: p\nTableDef: foo\n{1}\n1,6,7:{2}\nDefault:{3}\nw=3:{4}\nc=19:{5}\nasdf:{6}\n";

#[test]
fn roll_mode_is_uniform_over_rows() {
    let (program, rng) = program_from(MIXED_TABLE);
    push_samples(&rng, [5, 4, 3, 2, 1, 0]);
    for expect in ["6", "5", "4", "3", "2", "1"] {
        assert_eq!(eval(&program, "{ !foo() }"), ExpressionResult::text(expect));
    }
}

#[test]
fn explicit_roll_mode_matches_the_default() {
    let (program, rng) = program_from(MIXED_TABLE);
    push_samples(&rng, [0]);
    assert_eq!(eval(&program, "{ !foo(roll) }"), ExpressionResult::text("1"));
}

#[test]
fn weighted_mode_scans_prefix_weights() {
    let source = "TablePack: p\nTableDef: foo\nw=3: {1}\n{2}\nDefault w=4:{3}\nw=6 3-12:{4}\nc=19:{5}\nasdf:{6}\n";
    let (program, rng) = program_from(source);
    let cases = [(1, "1"), (3, "2"), (14, "5"), (11, "4")];
    for (sample, expect) in cases {
        push_samples(&rng, [sample]);
        assert_eq!(
            eval(&program, "{ !foo(weighted) }"),
            ExpressionResult::text(expect)
        );
    }
}

#[test]
fn label_mode_with_default_fallback() {
    let source = "TablePack: p\nTableDef: foo\nw=3 once: {1}\nupon:{2}\nDefault w=4 a:{3}\nw=6 3-12 time:{4}\nc=19 there:{5}\n\"was a\":{6}\n";
    let (program, _) = program_from(source);
    let cases = [
        ("was a", "6"),
        ("time", "4"),
        ("once", "1"),
        ("there", "5"),
        ("N/A", "3"),
    ];
    for (label, expect) in cases {
        let expr = format!("{{ !foo(label, \"{}\") }}", label);
        assert_eq!(eval(&program, &expr), ExpressionResult::text(expect));
    }
}

#[test]
fn index_mode_picks_first_declared_range() {
    let source = "TablePack: p\nTableDef: foo\n1,2,6-8: {1}\nDefault: {2}\nw=4 13-15:{3}\nasdf:{4}\n9: {5}\n";
    let (program, _) = program_from(source);
    let cases = [(9, "5"), (8, "1"), (14, "3"), (128, "2")];
    for (index, expect) in cases {
        let expr = format!("{{ !foo(index, {}) }}", index);
        assert_eq!(eval(&program, &expr), ExpressionResult::text(expect));
    }
}

#[test]
fn deck_mode_draws_exhaust_and_shuffle_restores() {
    // One row with two copies: two draws, then exhaustion, then a
    // shuffle rescues the third draw.
    let source = "TablePack: p\nTableDef: foo\nc=2: \"card\"\n";
    let (program, rng) = program_from(source);

    push_samples(&rng, [0, 0]);
    assert_eq!(eval(&program, "{ !foo(deck) }"), ExpressionResult::text("card"));
    assert_eq!(
        eval(&program, "{ !foo(deck, no-shuffle) }"),
        ExpressionResult::text("card")
    );

    let err = eval_err(&program, "{ !foo(deck) }");
    assert!(err.contains("deck exhausted"));

    push_samples(&rng, [0]);
    assert_eq!(
        eval(&program, "{ !foo(deck, shuffle) }"),
        ExpressionResult::text("card")
    );
}

#[test]
fn deck_mode_skips_spent_rows() {
    let source = "TablePack: p\nTableDef: foo\n{1}\nDefault w=3 c=2: {2}\nw=4:{3}\nasdf:{4}\nc=10 9: {5}\n";
    let (program, rng) = program_from(source);
    let cases = [(0, "1"), (0, "2"), (12, "5")];
    for (sample, expect) in cases {
        push_samples(&rng, [sample]);
        assert_eq!(
            eval(&program, "{ !foo(deck) }"),
            ExpressionResult::text(expect)
        );
    }
}

#[test]
fn generator_table_builds_the_full_product() {
    let source = "TablePack: p\nTableDef: cards\n[\"A\",\"2\",\"3\",\"4\", \"5\", \"6\", \"7\", \"8\", \"9\", \"10\" , \"J\" ,\"Q\",\n\"K\"][\" of \"][\"Clubs\", \"Spades\", \"Diamonds\", \"Hearts\"]\n";
    let (program, rng) = program_from(source);

    let table = program.root().unwrap().table("cards").unwrap();
    assert_eq!(table.row_count(), 52);
    assert_eq!(table.total_count(), 52);

    let cases = [(0, "A of Clubs"), (51, "K of Hearts"), (14, "2 of Spades")];
    for (sample, expect) in cases {
        push_samples(&rng, [sample]);
        assert_eq!(
            eval(&program, "{ !cards() }"),
            ExpressionResult::text(expect)
        );
    }

    assert_eq!(
        eval(&program, "{ !cards(index, 27) }"),
        ExpressionResult::text("A of Diamonds")
    );
}

#[test]
fn unknown_mode_is_a_runtime_error() {
    let (program, _) = program_from(MIXED_TABLE);
    assert!(eval_err(&program, "{ !foo(backwards) }").contains("unknown table call mode"));
}

#[test]
fn mode_argument_type_mismatches_are_runtime_errors() {
    let (program, _) = program_from(MIXED_TABLE);
    assert!(eval_err(&program, "{ !foo(index, oops) }").contains("expected an integer index"));
    assert!(eval_err(&program, "{ !foo(label, 7) }").contains("expected a string label"));
    assert!(eval_err(&program, "{ !foo(index) }").contains("required"));
    assert!(eval_err(&program, "{ !foo(deck, sideways) }").contains("shuffle"));
    assert!(eval_err(&program, "{ !foo(3) }").contains("unknown table call mode"));
}

#[test]
fn row_expressions_see_outer_variables() {
    // The called row's expression reads a variable bound by the
    // calling expression: context frames chain through table calls.
    let source = "TablePack: p\nTableDef: foo\nDefault: {@x}\n";
    let (program, _) = program_from(source);
    assert_eq!(
        eval(&program, "{ @x=treasure; !foo(label, anything) }"),
        ExpressionResult::text("treasure")
    );
}

#[test]
fn tags_survive_compilation() {
    let source = "TablePack: p\nTableDef: foo\n~ fruit: banana\n~ class: \"melee fighter\"\n\"x\"\n";
    let (program, _) = program_from(source);
    let table = program.root().unwrap().table("foo").unwrap();
    assert_eq!(table.tag("fruit"), Some("banana"));
    assert_eq!(table.tag("class"), Some("melee fighter"));
    assert_eq!(table.tag("hero"), None);
}

#[test]
fn rows_spanning_lines_with_arrows() {
    let source = "TablePack: p\nTableDef: foo\nDefault: \"one \" ->\n\"two\"\n";
    let (program, _) = program_from(source);
    assert_eq!(
        eval(&program, "{ !foo(label, x) }"),
        ExpressionResult::text("one two")
    );
}

#[test]
fn multi_item_rows_concatenate() {
    let source = "TablePack: p\nTableDef: foo\nDefault: {5} \" gold and \" {2} \" gems\"\n";
    let (program, _) = program_from(source);
    assert_eq!(
        eval(&program, "{ !foo(label, x) }"),
        ExpressionResult::text("5 gold and 2 gems")
    );
}
