//! Property tests for deck draws and deterministic evaluation.

use proptest::prelude::*;
use rolltable_core::{QueueRandom, RollHistory};
use rolltable_engine::{DeckMode, Evaluable, ExecutionContext, PackMap, Range, Table, TableRow};
use std::collections::HashMap;
use std::sync::Arc;

fn table_with_counts(counts: &[i64]) -> Table {
    let rows: Vec<TableRow> = counts
        .iter()
        .enumerate()
        .map(|(index, count)| {
            TableRow::new(
                None,
                vec![Range::single(index as i64 + 1)],
                1,
                *count,
                false,
                Arc::new(Evaluable::text(format!("row {}", index))),
            )
        })
        .collect();
    Table::new("deck", HashMap::new(), rows)
}

fn ctx_with_samples(samples: Vec<i64>) -> ExecutionContext {
    let (rng, _) = QueueRandom::shared(samples);
    ExecutionContext::root(Arc::new(PackMap::new()), rng, Arc::new(RollHistory::new()))
}

proptest! {
    /// After every successful draw the per-row remaining counts still
    /// sum to the table's current count, and each draw spends exactly
    /// one copy.
    #[test]
    fn deck_draws_conserve_counts(
        counts in prop::collection::vec(1i64..5, 1..8),
        draws in prop::collection::vec(0i64..1000, 0..24),
    ) {
        let table = table_with_counts(&counts);
        let total: i64 = counts.iter().sum();
        prop_assert_eq!(table.current_count(), total);

        let mut expected = total;
        for sample in draws {
            if expected == 0 {
                break;
            }
            // Samples must land in [0, remaining).
            let ctx = ctx_with_samples(vec![sample % expected]);
            table.deck_draw(&ctx, DeckMode::NoShuffle).unwrap();
            expected -= 1;

            let per_row: i64 = table.row_counts().iter().sum();
            prop_assert_eq!(per_row, table.current_count());
            prop_assert_eq!(table.current_count(), expected);
        }
    }

    /// Shuffling always restores the declared counts.
    #[test]
    fn shuffle_restores_declared_counts(
        counts in prop::collection::vec(1i64..5, 1..8),
        spend in 0usize..8,
    ) {
        let table = table_with_counts(&counts);
        let total: i64 = counts.iter().sum();
        for _ in 0..spend.min(total as usize) {
            let remaining = table.current_count();
            let ctx = ctx_with_samples(vec![remaining - 1]);
            table.deck_draw(&ctx, DeckMode::NoShuffle).unwrap();
        }
        table.shuffle();
        prop_assert_eq!(table.current_count(), total);
    }

    /// Weighted selection always lands on a row whose prefix-weight
    /// window covers the sample.
    #[test]
    fn weighted_rolls_respect_prefix_windows(
        weights in prop::collection::vec(1i64..9, 1..8),
        seed in 0i64..10_000,
    ) {
        let rows: Vec<TableRow> = weights
            .iter()
            .enumerate()
            .map(|(index, weight)| {
                TableRow::new(
                    None,
                    Vec::new(),
                    *weight,
                    1,
                    false,
                    Arc::new(Evaluable::Number(index as i64)),
                )
            })
            .collect();
        let table = Table::new("weighted", HashMap::new(), rows);
        let total: i64 = weights.iter().sum();
        let sample = seed % total;

        let ctx = ctx_with_samples(vec![sample]);
        let row = table.weighted_row(&ctx).unwrap();
        let picked = match row.value().as_ref() {
            Evaluable::Number(index) => *index as usize,
            other => panic!("unexpected row value {:?}", other),
        };
        let before: i64 = weights[..picked].iter().sum();
        prop_assert!(sample >= before);
        prop_assert!(sample < before + weights[picked]);
    }
}
