//! Per-kind evaluation counters.
//!
//! The evaluator reports one increment per evaluation that actually ran.
//! Cache hits and detected cycles are never counted, so a counter measures
//! work performed rather than requests made.

use std::cell::RefCell;

use fxhash::FxHashMap;

use crate::registry::{RequestKind, RequestKindId};

/// Receives one call per evaluation that ran to success.
///
/// Sinks are purely observational. They must not call back into the
/// evaluator.
pub trait StatisticsSink {
    /// Records that a request of `kind` was evaluated.
    fn record_evaluation(&self, kind: &RequestKind);
}

/// The evaluator's built-in statistics sink.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: RefCell<FxHashMap<RequestKindId, usize>>,
}

impl Statistics {
    /// Creates a table with every counter at zero.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Returns the number of evaluations recorded for `id`.
    #[must_use]
    pub fn count(&self, id: RequestKindId) -> usize {
        self.counters.borrow().get(&id).copied().unwrap_or(0)
    }

    /// Returns the number of evaluations recorded over every kind.
    #[must_use]
    pub fn total(&self) -> usize { self.counters.borrow().values().sum() }

    /// Returns the non-zero counters ordered by kind identity.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(RequestKindId, usize)> {
        let mut counters = self
            .counters
            .borrow()
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect::<Vec<_>>();

        counters.sort_unstable_by_key(|(id, _)| *id);
        counters
    }

    /// Sets every counter back to zero.
    pub fn reset(&self) { self.counters.borrow_mut().clear(); }
}

impl StatisticsSink for Statistics {
    fn record_evaluation(&self, kind: &RequestKind) {
        *self.counters.borrow_mut().entry(kind.id()).or_default() += 1;
    }
}
