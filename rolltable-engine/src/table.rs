//! Tables, rows, ranges, and the five row-selection modes
//!
//! A table is an ordered collection of rows with precomputed totals and
//! lookup indexes. Four of the selection modes (`roll`, `weighted`,
//! `index`, `label`) are pure reads; `deck` carries mutable draw state
//! behind a per-table mutex. Range back-references are row indexes into
//! the table's row vector, so cloning a table needs no pointer fix-up.

use crate::context::ExecutionContext;
use crate::tree::Evaluable;
use rolltable_core::{EvalError, EvalResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A closed integer interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub low: i64,
    pub high: i64,
}

impl Range {
    pub fn new(low: i64, high: i64) -> Self {
        Self { low, high }
    }

    pub fn single(value: i64) -> Self {
        Self {
            low: value,
            high: value,
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// One table row: selection metadata plus a value expression.
#[derive(Debug, Clone)]
pub struct TableRow {
    label: Option<String>,
    ranges: Vec<Range>,
    weight: i64,
    count: i64,
    is_default: bool,
    value: Arc<Evaluable>,
}

impl TableRow {
    pub fn new(
        label: Option<String>,
        ranges: Vec<Range>,
        weight: i64,
        count: i64,
        is_default: bool,
        value: Arc<Evaluable>,
    ) -> Self {
        Self {
            label,
            ranges,
            weight: weight.max(1),
            count: count.max(1),
            is_default,
            value,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn weight(&self) -> i64 {
        self.weight
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn value(&self) -> &Arc<Evaluable> {
        &self.value
    }
}

/// Deck bookkeeping: remaining copies per row and in total.
#[derive(Debug, Clone)]
struct DeckState {
    remaining: i64,
    row_remaining: Vec<i64>,
}

impl DeckState {
    fn full(rows: &[TableRow]) -> Self {
        let row_remaining: Vec<i64> = rows.iter().map(TableRow::count).collect();
        Self {
            remaining: row_remaining.iter().sum(),
            row_remaining,
        }
    }
}

/// Shuffle behavior for a deck draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeckMode {
    #[default]
    NoShuffle,
    Shuffle,
}

/// A named, ordered collection of rows with an optional default row and
/// deck state.
#[derive(Debug)]
pub struct Table {
    name: String,
    tags: HashMap<String, String>,
    rows: Vec<TableRow>,
    rows_by_label: HashMap<String, usize>,
    rows_by_range: Vec<(Range, usize)>,
    total_weight: i64,
    total_count: i64,
    default_row: Option<usize>,
    deck: Mutex<DeckState>,
}

impl Table {
    pub fn new(name: impl Into<String>, tags: HashMap<String, String>, rows: Vec<TableRow>) -> Self {
        let mut rows_by_label = HashMap::new();
        let mut rows_by_range = Vec::new();
        let mut total_weight = 0;
        let mut total_count = 0;
        let mut default_row = None;

        for (index, row) in rows.iter().enumerate() {
            if let Some(label) = row.label() {
                // First declaration wins; the compiler rejects duplicates.
                rows_by_label.entry(label.to_string()).or_insert(index);
            }
            for range in row.ranges() {
                rows_by_range.push((*range, index));
            }
            total_weight += row.weight();
            total_count += row.count();
            if row.is_default() {
                default_row = Some(index);
            }
        }

        let deck = Mutex::new(DeckState::full(&rows));
        Self {
            name: name.into(),
            tags,
            rows,
            rows_by_label,
            rows_by_range,
            total_weight,
            total_count,
            default_row,
            deck,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        &self.tags
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    /// Remaining deck copies across all rows.
    pub fn current_count(&self) -> i64 {
        self.deck().remaining
    }

    /// Remaining deck copies for each row, in declaration order.
    pub fn row_counts(&self) -> Vec<i64> {
        self.deck().row_remaining.clone()
    }

    fn deck(&self) -> MutexGuard<'_, DeckState> {
        match self.deck.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The default row, if one is declared.
    pub fn default_row(&self) -> EvalResult<&TableRow> {
        self.default_row
            .map(|index| &self.rows[index])
            .ok_or_else(|| EvalError::NoDefaultRow {
                table: self.name.clone(),
            })
    }

    /// Uniform pick over rows, ignoring weights and counts.
    pub fn roll_row(&self, ctx: &ExecutionContext) -> EvalResult<&TableRow> {
        let index = ctx.sample(0, self.rows.len() as i64)?;
        self.rows
            .get(index as usize)
            .ok_or_else(|| EvalError::internal("row roll out of range"))
    }

    /// Weighted pick: uniform in `[0, total_weight)`, linear prefix scan.
    pub fn weighted_row(&self, ctx: &ExecutionContext) -> EvalResult<&TableRow> {
        let sample = ctx.sample(0, self.total_weight)?;
        let mut prefix = 0;
        for row in &self.rows {
            prefix += row.weight();
            if prefix > sample {
                return Ok(row);
            }
        }
        Err(EvalError::internal("weighted roll overran total weight"))
    }

    /// First row whose range contains `index`, else the default row.
    pub fn index_row(&self, index: i64) -> EvalResult<&TableRow> {
        for (range, row) in &self.rows_by_range {
            if range.contains(index) {
                return Ok(&self.rows[*row]);
            }
        }
        self.default_row().map_err(|_| EvalError::NoIndexMatch {
            table: self.name.clone(),
            index,
        })
    }

    /// Row with exactly this label, else the default row.
    pub fn label_row(&self, label: &str) -> EvalResult<&TableRow> {
        if let Some(index) = self.rows_by_label.get(label) {
            return Ok(&self.rows[*index]);
        }
        self.default_row().map_err(|_| EvalError::NoLabelMatch {
            table: self.name.clone(),
            label: label.to_string(),
        })
    }

    /// Draw from the deck, decrementing one row copy and the table total.
    ///
    /// The mutex covers the reset, the exhaustion check, and the
    /// decrement; the drawn row's value expression is evaluated by the
    /// caller without the lock held.
    pub fn deck_draw(&self, ctx: &ExecutionContext, mode: DeckMode) -> EvalResult<&TableRow> {
        let mut deck = self.deck();
        if mode == DeckMode::Shuffle {
            *deck = DeckState::full(&self.rows);
        }
        if deck.remaining <= 0 {
            return Err(EvalError::DeckExhausted {
                table: self.name.clone(),
            });
        }
        let sample = ctx.sample(0, deck.remaining)?;
        let mut prefix = 0;
        for (index, remaining) in deck.row_remaining.iter_mut().enumerate() {
            prefix += *remaining;
            if prefix > sample {
                *remaining -= 1;
                deck.remaining -= 1;
                return Ok(&self.rows[index]);
            }
        }
        Err(EvalError::internal("deck draw overran remaining count"))
    }

    /// Restore every row's remaining count to its declared count.
    pub fn shuffle(&self) {
        *self.deck() = DeckState::full(&self.rows);
    }
}

impl Clone for Table {
    /// Clones reset deck state to the declared counts, giving session
    /// copies independent draw state.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tags: self.tags.clone(),
            rows: self.rows.clone(),
            rows_by_label: self.rows_by_label.clone(),
            rows_by_range: self.rows_by_range.clone(),
            total_weight: self.total_weight,
            total_count: self.total_count,
            default_row: self.default_row,
            deck: Mutex::new(DeckState::full(&self.rows)),
        }
    }
}
