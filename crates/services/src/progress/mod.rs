//! Learner progress: the tracker, its state machine, and the cache format.

mod cache_codec;
mod state;
mod tracker;

pub use state::{ProgressFailure, ProgressOperation, TrackerPhase};
pub use tracker::{PendingReconcile, ProgressTracker, ReconcileOutcome};
