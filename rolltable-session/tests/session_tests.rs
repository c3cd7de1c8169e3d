//! Session registry end-to-end: isolation, history, and eviction.

use rolltable_core::{ExpressionResult, QueueRandom};
use rolltable_dsl::{compile_expression, Compiler};
use rolltable_engine::Program;
use rolltable_session::{SessionError, SessionSet};
use std::time::Duration;

const DECK_PACK: &str = "TablePack: p\nTableDef: cards\nc=2: \"ace\"\n";

fn deck_program() -> Program {
    Compiler::new().compile_source(DECK_PACK).expect("compile")
}

fn registry() -> SessionSet {
    SessionSet::new(16, Duration::from_secs(3600))
}

#[test]
fn eval_through_a_session() {
    let set = registry();
    let program = deck_program();
    let sid = set.create_session();
    set.attach_program(&sid, "p", &program).unwrap();

    let expr = compile_expression("{ add(2, 3) }", &program).unwrap();
    let result = set.eval(&sid, "p", &expr).unwrap();
    assert_eq!(result, ExpressionResult::Int(5));
}

#[test]
fn unknown_session_and_program_errors() {
    let set = registry();
    let program = deck_program();
    let expr = compile_expression("{ 1 }", &program).unwrap();

    let err = set.eval("ghost", "p", &expr).unwrap_err();
    assert!(matches!(err, SessionError::UnknownSession { .. }));

    let sid = set.create_session();
    let err = set.eval(&sid, "p", &expr).unwrap_err();
    assert!(matches!(err, SessionError::UnknownProgram { .. }));

    let err = set.attach_program("ghost", "p", &program).unwrap_err();
    assert!(matches!(err, SessionError::UnknownSession { .. }));
}

#[test]
fn deck_state_is_session_local() {
    let set = registry();
    let program = deck_program();

    let one = set.create_session();
    let two = set.create_session();
    set.attach_program(&one, "p", &program).unwrap();
    set.attach_program(&two, "p", &program).unwrap();

    // Pin both sessions' RNGs so draws are deterministic, then
    // re-attach so the clones pick up the pinned source.
    for sid in [&one, &two] {
        set.with_session(sid, |session| {
            let (rng, _) = QueueRandom::shared([0, 0]);
            session.set_random(rng);
        })
        .unwrap();
        set.attach_program(sid, "p", &program).unwrap();
    }

    let draw = compile_expression("{ !cards(deck) }", &program).unwrap();

    // Exhaust session one's deck.
    set.eval(&one, "p", &draw).unwrap();
    set.eval(&one, "p", &draw).unwrap();
    let err = set.eval(&one, "p", &draw).unwrap_err();
    assert!(matches!(err, SessionError::Eval(_)));

    // Session two still has its full deck.
    assert_eq!(
        set.eval(&two, "p", &draw).unwrap(),
        ExpressionResult::text("ace")
    );

    // And the source program never lost a card.
    let table = program.root().unwrap().table("cards").unwrap();
    assert_eq!(table.current_count(), 2);
}

#[test]
fn roll_history_is_per_session_and_ordered() {
    let set = registry();
    let program = deck_program();

    let one = set.create_session();
    let two = set.create_session();

    for sid in [&one, &two] {
        set.with_session(sid, |session| {
            let (rng, _) = QueueRandom::shared([2, 5, 1]);
            session.set_random(rng);
        })
        .unwrap();
        set.attach_program(sid, "p", &program).unwrap();
    }

    let expr = compile_expression("{ add(1d6?, 1d8?) }", &program).unwrap();
    set.eval(&one, "p", &expr).unwrap();

    let history = set.roll_history(&one).unwrap();
    assert_eq!(history, vec!["2: 1d6 (2)", "5: 1d8 (5)"]);
    assert_eq!(set.latest_roll(&one).unwrap().unwrap(), "5: 1d8 (5)");

    // The other session heard nothing.
    assert!(set.roll_history(&two).unwrap().is_empty());
}

#[test]
fn attached_program_names_are_listed() {
    let set = registry();
    let program = deck_program();
    let sid = set.create_session();
    set.attach_program(&sid, "alpha", &program).unwrap();
    set.attach_program(&sid, "beta", &program).unwrap();

    let mut names = set.program_names(&sid).unwrap();
    names.sort();
    assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn capacity_eviction_under_load() {
    // A strictly ticking clock keeps eviction order deterministic.
    let ticks = std::sync::atomic::AtomicI64::new(0);
    let base = chrono::Utc::now();
    let set = SessionSet::with_clock(
        4,
        Duration::from_secs(3600),
        std::sync::Arc::new(move || {
            base + chrono::Duration::seconds(ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
        }),
    );
    let ids: Vec<String> = (0..8).map(|_| set.create_session()).collect();
    assert_eq!(set.len(), 4);
    // The four newest survive.
    for id in &ids[4..] {
        assert!(set.contains(id));
    }
    for id in &ids[..4] {
        assert!(!set.contains(id));
    }
}
