use std::collections::VecDeque;

use academy_core::model::{Identity, ProgressSnapshot};
use chrono::{DateTime, Utc};

use crate::error::{ProgressError, ProgressFailureKind};

/// How many absorbed failures are kept for diagnostics.
const FAILURE_HISTORY: usize = 16;

/// Lifecycle of the tracker within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Nothing loaded yet.
    Uninitialized,
    /// Snapshot filled from the local cache; may be stale or anonymous.
    OptimisticallyLoaded,
    /// A remote fetch for the current identity is in flight.
    Reconciling,
    /// Settled for the current identity (or anonymous).
    Ready,
}

/// Which tracker step absorbed a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOperation {
    CacheRead,
    CacheWrite,
    Reconcile,
    RemoteWrite,
}

/// A failure the tracker swallowed, with when and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressFailure {
    pub operation: ProgressOperation,
    pub error: ProgressError,
    pub at: DateTime<Utc>,
}

impl ProgressFailure {
    #[must_use]
    pub fn kind(&self) -> ProgressFailureKind {
        self.error.kind()
    }
}

/// Mutable tracker state. Only ever touched under the tracker's lock and never
/// across an await point.
#[derive(Debug)]
pub(crate) struct TrackerState {
    pub(crate) phase: TrackerPhase,
    pub(crate) snapshot: ProgressSnapshot,
    pub(crate) identity: Option<Identity>,
    /// Bumped on every identity event; a fetch whose epoch no longer matches is stale.
    pub(crate) epoch: u64,
    pub(crate) loading: bool,
    failures: VecDeque<ProgressFailure>,
}

impl TrackerState {
    pub(crate) fn new() -> Self {
        Self {
            phase: TrackerPhase::Uninitialized,
            snapshot: ProgressSnapshot::new(),
            identity: None,
            epoch: 0,
            loading: true,
            failures: VecDeque::with_capacity(FAILURE_HISTORY),
        }
    }

    pub(crate) fn record_failure(&mut self, failure: ProgressFailure) {
        tracing::warn!(
            kind = %failure.kind(),
            operation = ?failure.operation,
            error = %failure.error,
            "progress failure absorbed"
        );
        if self.failures.len() == FAILURE_HISTORY {
            self.failures.pop_front();
        }
        self.failures.push_back(failure);
    }

    pub(crate) fn failures(&self) -> Vec<ProgressFailure> {
        self.failures.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::time::fixed_now;

    #[test]
    fn failure_history_is_bounded() {
        let mut state = TrackerState::new();
        for n in 0..(FAILURE_HISTORY + 4) {
            state.record_failure(ProgressFailure {
                operation: ProgressOperation::RemoteWrite,
                error: ProgressError::RemoteUnavailable(format!("attempt {n}")),
                at: fixed_now(),
            });
        }

        let kept = state.failures();
        assert_eq!(kept.len(), FAILURE_HISTORY);
        assert_eq!(
            kept[0].error,
            ProgressError::RemoteUnavailable("attempt 4".into())
        );
    }

    #[test]
    fn fresh_state_is_loading_and_uninitialized() {
        let state = TrackerState::new();
        assert!(state.loading);
        assert_eq!(state.phase, TrackerPhase::Uninitialized);
        assert!(state.snapshot.is_empty());
    }
}
