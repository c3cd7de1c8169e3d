//! Dice-roll resolution
//!
//! One entry point: resolve a `RollSpec` against a context. Samples are
//! drawn in order from the context's random source, sorted ascending,
//! optionally trimmed by a high/low selector, then reduced. Every roll
//! appends its human-readable line to the roll history; `.str` makes
//! that line the result instead of the integer.

use crate::context::ExecutionContext;
use crate::tree::{RollAggr, RollSpec};
use rolltable_core::{EvalError, EvalResult, ExpressionResult};

pub(crate) fn resolve_roll(spec: &RollSpec, ctx: &ExecutionContext) -> EvalResult<ExpressionResult> {
    let mut kept = Vec::with_capacity(spec.dice_count as usize);
    for _ in 0..spec.dice_count {
        kept.push(ctx.sample(1, spec.dice_sides + 1)?);
    }
    kept.sort_unstable();

    let mut dropped = Vec::new();
    if let Some(selector) = &spec.selector {
        let keep = selector.count;
        if keep > spec.dice_count {
            return Err(EvalError::SelectorTooLarge {
                keep,
                rolled: spec.dice_count,
            });
        }
        let cut = (spec.dice_count - keep) as usize;
        if selector.high {
            dropped = kept.drain(..cut).collect();
        } else {
            dropped = kept.split_off(keep as usize);
        }
    }

    if !spec.count_aggrs.is_empty() && spec.aggr != RollAggr::Default {
        return Err(EvalError::AggregatorConflict {
            aggr: spec.aggr.display_name().to_string(),
        });
    }

    let value = if !spec.count_aggrs.is_empty() {
        count_aggr_value(spec, &kept)
    } else {
        reduce(spec, &kept)
    };

    let line = format_roll(spec, value, &kept, &dropped);
    ctx.record_roll(line.clone());

    if spec.as_string {
        Ok(ExpressionResult::Text(line))
    } else {
        Ok(ExpressionResult::Int(value))
    }
}

fn count_aggr_value(spec: &RollSpec, kept: &[i64]) -> i64 {
    let mut value = 0;
    for &die in kept {
        for aggr in &spec.count_aggrs {
            if die == aggr.face {
                value += aggr.multiplier;
            }
        }
    }
    value
}

fn reduce(spec: &RollSpec, kept: &[i64]) -> i64 {
    match spec.aggr {
        RollAggr::Default | RollAggr::Sum => kept.iter().sum(),
        RollAggr::Min => kept.iter().copied().min().unwrap_or(0),
        RollAggr::Max => kept.iter().copied().max().unwrap_or(0),
        // Intentionally divides by the declared dice count, not the
        // kept count.
        RollAggr::Avg => kept.iter().sum::<i64>() / spec.dice_count,
        RollAggr::Mode => mode(kept),
        RollAggr::Median => median(kept),
    }
}

/// Most frequent kept value; ties resolve to the smallest face because
/// the kept dice are sorted ascending and only a strictly greater count
/// replaces the candidate.
fn mode(kept: &[i64]) -> i64 {
    let mut best = 0;
    let mut best_count = 0;
    let mut index = 0;
    while index < kept.len() {
        let value = kept[index];
        let mut count = 0;
        while index < kept.len() && kept[index] == value {
            count += 1;
            index += 1;
        }
        if count > best_count {
            best = value;
            best_count = count;
        }
    }
    best
}

/// Middle of the sorted kept dice; an even count averages the two
/// middles with integer division.
fn median(kept: &[i64]) -> i64 {
    if kept.is_empty() {
        return 0;
    }
    let mid = kept.len() / 2;
    if kept.len() % 2 == 1 {
        kept[mid]
    } else {
        (kept[mid - 1] + kept[mid]) / 2
    }
}

/// Render the history line: `"<value>: NdM <fn>(<kept>, …) drop(<dropped>, …)"`,
/// with count-aggregator multipliers annotated after each matching kept
/// face (`"5=2,3"` style).
fn format_roll(spec: &RollSpec, value: i64, kept: &[i64], dropped: &[i64]) -> String {
    let mut kept_parts = Vec::with_capacity(kept.len());
    for &die in kept {
        let mut part = die.to_string();
        let mut first = true;
        for aggr in &spec.count_aggrs {
            if die == aggr.face {
                part.push(if first { '=' } else { ',' });
                first = false;
                part.push_str(&aggr.multiplier.to_string());
            }
        }
        kept_parts.push(part);
    }

    let mut line = format!(
        "{}: {}d{} {}({})",
        value,
        spec.dice_count,
        spec.dice_sides,
        spec.aggr.display_name(),
        kept_parts.join(", "),
    );
    if !dropped.is_empty() {
        let drop_parts: Vec<String> = dropped.iter().map(i64::to_string).collect();
        line.push_str(&format!(" drop({})", drop_parts.join(", ")));
    }
    line
}
