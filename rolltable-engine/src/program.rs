//! Compiled programs and packs
//!
//! A program is a mapping from pack key to pack, plus a distinguished
//! root entry under the reserved key `_ROOT`. Pack keys are the
//! hex-encoded MD5 of the source file bytes, so identical files share
//! one entry and import cycles resolve structurally. The program also
//! carries the name map the compiler built (dotted pack name → key) so
//! interactive expressions can be lowered against it later.

use crate::context::ExecutionContext;
use crate::evaluator::evaluate;
use crate::table::Table;
use crate::tree::Evaluable;
use rolltable_core::{EvalResult, ExpressionResult, RollHistory, SharedRandom, ThreadRandom};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved key for the root pack entry.
pub const ROOT_PACK: &str = "_ROOT";

/// Pack-key → pack mapping shared by every execution context.
pub type PackMap = HashMap<String, Arc<Pack>>;

/// The contents of one compiled source file.
///
/// Immutable after compilation, except for the deck state held inside
/// its tables.
#[derive(Debug, Clone)]
pub struct Pack {
    name: String,
    key: String,
    tables: HashMap<String, Table>,
}

impl Pack {
    pub fn new(name: impl Into<String>, key: impl Into<String>, tables: HashMap<String, Table>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            tables,
        }
    }

    /// Human-readable dotted name, e.g. `foo.bar`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hex-encoded MD5 of the source bytes.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> &HashMap<String, Table> {
        &self.tables
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

/// A compiled multi-pack program with its evaluation plumbing.
pub struct Program {
    packs: Arc<PackMap>,
    names: HashMap<String, String>,
    root_key: String,
    rng: SharedRandom,
    history: Arc<RollHistory>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("names", &self.names)
            .field("root_key", &self.root_key)
            .field("history", &self.history)
            .finish()
    }
}

impl Program {
    /// Assemble a program from compiled packs. The root pack is aliased
    /// under `_ROOT` if the compiler did not already do so.
    pub fn new(
        mut packs: PackMap,
        names: HashMap<String, String>,
        root_key: impl Into<String>,
    ) -> Self {
        let root_key = root_key.into();
        if let Some(root) = packs.get(&root_key).cloned() {
            packs.entry(ROOT_PACK.to_string()).or_insert(root);
        }
        Self {
            packs: Arc::new(packs),
            names,
            root_key,
            rng: ThreadRandom::shared(),
            history: Arc::new(RollHistory::new()),
        }
    }

    /// Evaluate a compiled expression in a fresh root context.
    pub fn eval(&self, expr: &Arc<Evaluable>) -> EvalResult<ExpressionResult> {
        let ctx = ExecutionContext::root(
            self.packs.clone(),
            self.rng.clone(),
            self.history.clone(),
        );
        evaluate(expr, &ctx)
    }

    pub fn pack(&self, key: &str) -> Option<&Arc<Pack>> {
        self.packs.get(key)
    }

    pub fn root(&self) -> Option<&Arc<Pack>> {
        self.packs.get(ROOT_PACK)
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    /// Number of distinct packs, not counting the `_ROOT` alias.
    pub fn pack_count(&self) -> usize {
        self.packs.keys().filter(|key| *key != ROOT_PACK).count()
    }

    /// Compiler-built map from dotted pack name (and `""`) to pack key,
    /// used to lower interactive expressions.
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    pub fn history(&self) -> &Arc<RollHistory> {
        &self.history
    }

    pub fn set_history(&mut self, history: Arc<RollHistory>) {
        self.history = history;
    }

    pub fn set_random(&mut self, rng: SharedRandom) {
        self.rng = rng;
    }

    /// Deep-copy this program for a session: deck counts reset to their
    /// declared values, the `_ROOT` alias still points at the cloned
    /// root, and the session supplies the history and random source.
    pub fn clone_for_session(&self, rng: SharedRandom, history: Arc<RollHistory>) -> Program {
        let mut packs = PackMap::new();
        for (key, pack) in self.packs.iter() {
            if key == ROOT_PACK {
                continue;
            }
            packs.insert(key.clone(), Arc::new(pack.as_ref().clone()));
        }
        if let Some(root) = packs.get(&self.root_key).cloned() {
            packs.insert(ROOT_PACK.to_string(), root);
        } else if let Some(root) = self.packs.get(ROOT_PACK) {
            // Root compiled under the reserved key only.
            packs.insert(ROOT_PACK.to_string(), Arc::new(root.as_ref().clone()));
        }
        Program {
            packs: Arc::new(packs),
            names: self.names.clone(),
            root_key: self.root_key.clone(),
            rng,
            history,
        }
    }
}
