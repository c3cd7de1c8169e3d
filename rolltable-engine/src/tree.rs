//! The executable tree
//!
//! `Evaluable` is the node kind the compiler lowers to. Children are
//! reference-counted so per-invocation evaluations hold cheap handles
//! and compiled programs share structure across session clones.

use crate::functions::FunctionDef;
use std::sync::Arc;

/// A compiled expression-tree node.
#[derive(Debug, Clone)]
pub enum Evaluable {
    /// Integer literal.
    Number(i64),
    /// String literal; `label` records whether the source form was a bare
    /// label rather than a quoted string.
    Text { value: String, label: bool },
    /// Variable reference, resolved against the context chain at runtime.
    Variable(String),
    /// Call into the closed function registry. Arity was checked at
    /// compile time; argument types are checked as results arrive.
    Function {
        def: &'static FunctionDef,
        args: Vec<Arc<Evaluable>>,
    },
    /// The one lazily-evaluated function: condition first, then exactly
    /// one branch.
    If {
        condition: Arc<Evaluable>,
        then_branch: Arc<Evaluable>,
        else_branch: Arc<Evaluable>,
    },
    /// Table lookup, resolved to a concrete pack key at compile time.
    /// `pack_name` is retained for diagnostics.
    TableCall {
        pack_key: String,
        pack_name: String,
        table: String,
        args: Vec<Arc<Evaluable>>,
    },
    /// Dice roll.
    Roll(RollSpec),
    /// Row value: evaluates each item and concatenates the results.
    List(Vec<Arc<Evaluable>>),
    /// Braced expression: bind variables in declaration order, then
    /// evaluate the body.
    Expr {
        vars: Vec<(String, Arc<Evaluable>)>,
        body: Arc<Evaluable>,
    },
}

impl Evaluable {
    pub fn text(value: impl Into<String>) -> Self {
        Evaluable::Text {
            value: value.into(),
            label: false,
        }
    }

    pub fn label(value: impl Into<String>) -> Self {
        Evaluable::Text {
            value: value.into(),
            label: true,
        }
    }
}

/// Compiled settings of one `NdM` roll expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollSpec {
    pub dice_count: i64,
    pub dice_sides: i64,
    pub selector: Option<RollSelect>,
    pub aggr: RollAggr,
    pub count_aggrs: Vec<RollCountAggr>,
    /// `.str` flag: the roll's history line becomes the result.
    pub as_string: bool,
}

impl RollSpec {
    pub fn new(dice_count: i64, dice_sides: i64) -> Self {
        Self {
            dice_count,
            dice_sides,
            selector: None,
            aggr: RollAggr::Default,
            count_aggrs: Vec::new(),
            as_string: false,
        }
    }
}

/// Keep only the highest or lowest `count` dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollSelect {
    pub high: bool,
    pub count: i64,
}

/// Signed per-face contribution: each kept die showing `face` adds
/// `multiplier` to the roll value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollCountAggr {
    pub face: i64,
    pub multiplier: i64,
}

/// Reduction applied to the kept dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollAggr {
    /// No explicit aggregator: sum, unless count aggregation is present.
    #[default]
    Default,
    Sum,
    Min,
    Max,
    Avg,
    Mode,
    Median,
}

impl RollAggr {
    /// Name as written in source and printed in roll-history lines;
    /// the implicit default prints as nothing.
    pub fn display_name(&self) -> &'static str {
        match self {
            RollAggr::Default => "",
            RollAggr::Sum => "sum",
            RollAggr::Min => "min",
            RollAggr::Max => "max",
            RollAggr::Avg => "avg",
            RollAggr::Mode => "mode",
            RollAggr::Median => "median",
        }
    }
}
