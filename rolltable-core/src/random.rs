//! Pluggable random sources

use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error returned when a random source cannot produce a sample.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("random source exhausted sampling [{low}, {high})")]
pub struct RngError {
    pub low: i64,
    pub high: i64,
}

/// A source of uniform random integers.
///
/// `sample` returns a value in the half-open interval `[low, high)`.
/// Implementations may be deterministic; the evaluator treats a failed
/// sample as a recoverable runtime error.
pub trait RandomSource: Send {
    fn sample(&mut self, low: i64, high: i64) -> Result<i64, RngError>;
}

/// Shared handle to a random source, cloned into every execution context.
pub type SharedRandom = Arc<Mutex<dyn RandomSource + Send>>;

/// Production random source backed by the thread-local generator.
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl ThreadRandom {
    pub fn shared() -> SharedRandom {
        Arc::new(Mutex::new(ThreadRandom))
    }
}

impl RandomSource for ThreadRandom {
    fn sample(&mut self, low: i64, high: i64) -> Result<i64, RngError> {
        if high <= low {
            return Err(RngError { low, high });
        }
        Ok(rand::thread_rng().gen_range(low..high))
    }
}

/// Deterministic random source fed from a queue of pre-seeded values.
///
/// Used by tests to pin down exact evaluation traces. Sampling past the
/// end of the queue is an error rather than a panic so a starved test
/// surfaces as a failed evaluation.
#[derive(Debug, Default)]
pub struct QueueRandom {
    values: VecDeque<i64>,
}

impl QueueRandom {
    pub fn new(values: impl IntoIterator<Item = i64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    /// Wrap a fresh queue in the shared handle the engine expects,
    /// returning both so a test can keep feeding it.
    pub fn shared(values: impl IntoIterator<Item = i64>) -> (SharedRandom, Arc<Mutex<QueueRandom>>) {
        let queue = Arc::new(Mutex::new(QueueRandom::new(values)));
        let shared: SharedRandom = queue.clone();
        (shared, queue)
    }

    /// Append more samples, in order.
    pub fn push(&mut self, values: impl IntoIterator<Item = i64>) {
        self.values.extend(values);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for QueueRandom {
    fn sample(&mut self, low: i64, high: i64) -> Result<i64, RngError> {
        self.values.pop_front().ok_or(RngError { low, high })
    }
}

/// Feed more samples into a shared queue source mid-test.
pub fn push_samples(queue: &Arc<Mutex<QueueRandom>>, values: impl IntoIterator<Item = i64>) {
    if let Ok(mut q) = queue.lock() {
        q.push(values);
    }
}
