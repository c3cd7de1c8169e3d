//! Execution contexts
//!
//! A context is one frame of a stack-linked chain: a local variable map,
//! a parent pointer, and shared handles to the program's pack map, its
//! random source, and the roll history. Variable reads walk the parent
//! chain; writes always land in the current frame, so inner frames
//! shadow without mutating their ancestors.

use crate::program::{Pack, PackMap};
use rolltable_core::{ExpressionResult, RngError, RollHistory, SharedRandom};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// One lexical frame plus shared evaluation plumbing.
///
/// Cloning a context clones the handle, not the frame. A fresh child
/// frame is pushed for every sub-expression invocation; contexts live
/// only for the duration of a single top-level evaluation.
#[derive(Clone)]
pub struct ExecutionContext {
    frame: Rc<Frame>,
}

struct Frame {
    parent: Option<Rc<Frame>>,
    values: RefCell<HashMap<String, ExpressionResult>>,
    packs: Arc<PackMap>,
    rng: SharedRandom,
    history: Arc<RollHistory>,
}

impl ExecutionContext {
    /// Root frame for a top-level evaluation.
    pub fn root(packs: Arc<PackMap>, rng: SharedRandom, history: Arc<RollHistory>) -> Self {
        Self {
            frame: Rc::new(Frame {
                parent: None,
                values: RefCell::new(HashMap::new()),
                packs,
                rng,
                history,
            }),
        }
    }

    /// Push a fresh child frame sharing this context's plumbing.
    pub fn child(&self) -> Self {
        Self {
            frame: Rc::new(Frame {
                parent: Some(self.frame.clone()),
                values: RefCell::new(HashMap::new()),
                packs: self.frame.packs.clone(),
                rng: self.frame.rng.clone(),
                history: self.frame.history.clone(),
            }),
        }
    }

    /// Bind a variable in the current frame, shadowing any outer binding.
    pub fn set(&self, name: impl Into<String>, value: ExpressionResult) {
        self.frame.values.borrow_mut().insert(name.into(), value);
    }

    /// Read a variable, walking the parent chain; the nearest binding wins.
    pub fn resolve(&self, name: &str) -> Option<ExpressionResult> {
        let mut current = Some(&self.frame);
        while let Some(frame) = current {
            if let Some(value) = frame.values.borrow().get(name) {
                return Some(value.clone());
            }
            current = frame.parent.as_ref();
        }
        None
    }

    /// Draw one sample from the shared random source, `[low, high)`.
    pub fn sample(&self, low: i64, high: i64) -> Result<i64, RngError> {
        match self.frame.rng.lock() {
            Ok(mut rng) => rng.sample(low, high),
            Err(mut poisoned) => poisoned.get_mut().sample(low, high),
        }
    }

    /// Look up a pack by key.
    pub fn pack(&self, key: &str) -> Option<Arc<Pack>> {
        self.frame.packs.get(key).cloned()
    }

    /// Append a line to the shared roll history.
    pub fn record_roll(&self, line: impl Into<String>) {
        self.frame.history.record(line);
    }

    pub fn history(&self) -> &Arc<RollHistory> {
        &self.frame.history
    }
}
