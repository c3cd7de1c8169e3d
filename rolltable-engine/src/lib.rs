//! Rolltable engine - compiled programs and their evaluation
//!
//! This crate owns everything downstream of the compiler: the executable
//! tree (`Evaluable`), the per-invocation evaluation state machines, the
//! explicit-stack evaluator, lexically-scoped execution contexts, the
//! closed function registry, dice-roll semantics, and the table-lookup
//! engine with its five row-selection modes.
//!
//! # Evaluation model
//!
//! ```text
//! Evaluable tree ──eval()──▶ Evaluation stack ──resolve()──▶ ExpressionResult
//!                               │    ▲
//!                            next()  │ provide()
//!                               ▼    │
//!                           child Evaluation
//! ```
//!
//! The work stack keeps host recursion depth constant regardless of
//! expression depth, and lets `if` observe only the branch it takes.

pub mod context;
pub mod evaluation;
pub mod evaluator;
pub mod functions;
pub mod program;
mod roll;
pub mod table;
pub mod tree;

pub use context::ExecutionContext;
pub use evaluation::Evaluation;
pub use evaluator::evaluate;
pub use functions::{lookup_function, ArgType, FunctionDef};
pub use program::{Pack, PackMap, Program, ROOT_PACK};
pub use table::{DeckMode, Range, Table, TableRow};
pub use tree::{Evaluable, RollAggr, RollCountAggr, RollSelect, RollSpec};
