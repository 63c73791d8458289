use std::sync::{Arc, Mutex, MutexGuard};

use academy_core::model::{
    CourseId, CourseProgress, Identity, LearnerId, LessonCompletion, LessonId, ProgressSnapshot,
    percentage,
};
use storage::repository::{LocalCache, ProgressRepository, StorageError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::cache_codec;
use super::state::{ProgressFailure, ProgressOperation, TrackerPhase, TrackerState};
use crate::Clock;
use crate::config::ProgressConfig;
use crate::error::{ProgressError, ProgressFailureKind};
use crate::identity::IdentityProvider;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote ids were unioned into the snapshot; `added` were new.
    Applied { added: usize },
    /// The fetch failed; the snapshot was left as it was.
    Failed(ProgressFailureKind),
    /// A newer identity event superseded this pass; its result was dropped.
    Stale,
}

/// A remote fetch scheduled by an identity event, not yet run.
#[must_use = "a pending reconciliation does nothing until run"]
pub struct PendingReconcile {
    tracker: ProgressTracker,
    epoch: u64,
    learner_id: LearnerId,
}

impl PendingReconcile {
    #[must_use]
    pub fn learner_id(&self) -> &LearnerId {
        &self.learner_id
    }

    /// Fetch the learner's completions and merge them into the tracker.
    pub async fn run(self) -> ReconcileOutcome {
        let fetched = self
            .tracker
            .inner
            .remote
            .fetch_completions(&self.learner_id)
            .await;
        self.tracker.apply_reconcile(self.epoch, &self.learner_id, fetched)
    }
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

struct Inner {
    cache_key: String,
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn ProgressRepository>,
    clock: Clock,
    state: Mutex<TrackerState>,
    changes: watch::Sender<u64>,
}

/// Single authority, per session, for which lessons the learner has completed.
///
/// Cloning is cheap and every clone shares the same state, so one tracker is
/// created at session start and handed to each consumer. Reads are synchronous
/// and never touch the network. Remote failures are absorbed: the UI only
/// ever sees the `loading` flag and the snapshot.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Inner>,
}

impl ProgressTracker {
    /// Create a tracker and fill it from the local cache, if the cache holds anything.
    #[must_use]
    pub fn mount(
        config: &ProgressConfig,
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn ProgressRepository>,
        clock: Clock,
    ) -> Self {
        let (changes, _rx) = watch::channel(0);
        let tracker = Self {
            inner: Arc::new(Inner {
                cache_key: config.cache_key.clone(),
                cache,
                remote,
                clock,
                state: Mutex::new(TrackerState::new()),
                changes,
            }),
        };
        tracker.load_cache();
        tracker
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|version| *version += 1);
    }

    fn failure(&self, operation: ProgressOperation, error: ProgressError) -> ProgressFailure {
        ProgressFailure {
            operation,
            error,
            at: self.inner.clock.now(),
        }
    }

    fn load_cache(&self) {
        let read = self.inner.cache.read(&self.inner.cache_key);
        let mut state = self.lock();
        match read.map_err(ProgressError::from_cache) {
            Ok(None) => tracing::debug!(key = %self.inner.cache_key, "no cached progress"),
            Ok(Some(value)) => match cache_codec::decode(value) {
                Ok(ids) => {
                    state.snapshot = ProgressSnapshot::from_ids(ids);
                    state.phase = TrackerPhase::OptimisticallyLoaded;
                    tracing::debug!(lessons = state.snapshot.len(), "progress loaded from cache");
                }
                Err(err) => {
                    let failure = self.failure(ProgressOperation::CacheRead, err);
                    state.record_failure(failure);
                }
            },
            Err(err) => {
                let failure = self.failure(ProgressOperation::CacheRead, err);
                state.record_failure(failure);
            }
        }
    }

    /// Mirror the snapshot to the cache. Failures are recorded, never raised.
    fn persist_snapshot(&self, state: &mut TrackerState) {
        let value = cache_codec::encode(&state.snapshot);
        if let Err(err) = self.inner.cache.write(&self.inner.cache_key, &value) {
            let failure = self.failure(ProgressOperation::CacheWrite, ProgressError::from_cache(err));
            state.record_failure(failure);
        }
    }

    //
    // ─── IDENTITY ─────────────────────────────────────────────────────────────
    //

    /// Apply an identity event.
    ///
    /// Signing out (or having no session) empties the in-memory snapshot but
    /// leaves the cache untouched. A present identity flags `loading` and
    /// returns the fetch that will reconcile it; any fetch started for an
    /// earlier event becomes stale.
    pub fn handle_identity(&self, identity: Option<Identity>) -> Option<PendingReconcile> {
        let pending = {
            let mut state = self.lock();
            state.epoch += 1;
            let epoch = state.epoch;
            state.identity.clone_from(&identity);

            match identity {
                None => {
                    state.snapshot.clear();
                    state.loading = false;
                    state.phase = TrackerPhase::Ready;
                    tracing::info!("no identity; progress reset to anonymous");
                    None
                }
                Some(identity) => {
                    state.loading = true;
                    state.phase = TrackerPhase::Reconciling;
                    tracing::debug!(learner = %identity.learner_id, epoch, "reconciling progress");
                    Some(PendingReconcile {
                        tracker: self.clone(),
                        epoch,
                        learner_id: identity.learner_id,
                    })
                }
            }
        };
        self.notify();
        pending
    }

    /// Handle an identity event and run its reconciliation to completion.
    pub async fn reconcile(&self, identity: Option<Identity>) -> Option<ReconcileOutcome> {
        match self.handle_identity(identity) {
            Some(pending) => Some(pending.run().await),
            None => None,
        }
    }

    fn apply_reconcile(
        &self,
        epoch: u64,
        learner_id: &LearnerId,
        fetched: Result<Vec<LessonId>, StorageError>,
    ) -> ReconcileOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.epoch != epoch {
                tracing::debug!(learner = %learner_id, epoch, "discarding stale reconciliation");
                return ReconcileOutcome::Stale;
            }

            let outcome = match fetched {
                Ok(remote_ids) => {
                    let added = state.snapshot.merge(remote_ids);
                    self.persist_snapshot(&mut state);
                    tracing::info!(
                        learner = %learner_id,
                        added,
                        total = state.snapshot.len(),
                        "progress reconciled"
                    );
                    ReconcileOutcome::Applied { added }
                }
                Err(err) => {
                    let error = ProgressError::from_remote(err);
                    let kind = error.kind();
                    let failure = self.failure(ProgressOperation::Reconcile, error);
                    state.record_failure(failure);
                    ReconcileOutcome::Failed(kind)
                }
            };
            state.loading = false;
            state.phase = TrackerPhase::Ready;
            outcome
        };
        self.notify();
        outcome
    }

    /// Feed every identity change from `provider` into the tracker.
    ///
    /// Each reconciliation runs on its own task so a newer identity is never
    /// queued behind an older fetch; the epoch check drops late results.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn follow_identity(&self, provider: &dyn IdentityProvider) -> JoinHandle<()> {
        let mut rx = provider.subscribe();
        let tracker = self.clone();
        tokio::spawn(async move {
            loop {
                let identity = rx.borrow_and_update().clone();
                if let Some(pending) = tracker.handle_identity(identity) {
                    tokio::spawn(pending.run());
                }
                if rx.changed().await.is_err() {
                    tracing::debug!("identity provider dropped; no longer following");
                    break;
                }
            }
        })
    }

    //
    // ─── COMPLETION ───────────────────────────────────────────────────────────
    //

    /// Mark a lesson as completed.
    ///
    /// The snapshot and cache are updated before this returns. When a learner
    /// is signed in, the remote upsert is spawned in the background and its
    /// handle returned; it refreshes `completed_at` even for a lesson that was
    /// already complete. Remote failures are recorded, never rolled back.
    pub fn complete_lesson(
        &self,
        lesson_id: LessonId,
        course_id: Option<CourseId>,
    ) -> Option<JoinHandle<()>> {
        let learner_id = {
            let mut state = self.lock();
            if state.snapshot.insert(lesson_id.clone()) {
                self.persist_snapshot(&mut state);
            }
            state.identity.as_ref().map(|i| i.learner_id.clone())
        };
        self.notify();

        let Some(learner_id) = learner_id else {
            tracing::debug!(lesson = %lesson_id, "anonymous completion kept locally");
            return None;
        };

        let completion =
            LessonCompletion::new(learner_id, lesson_id, course_id, self.inner.clock.now());
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let failure = self.failure(
                ProgressOperation::RemoteWrite,
                ProgressError::RemoteUnavailable("no async runtime for remote write".into()),
            );
            self.lock().record_failure(failure);
            return None;
        };

        let tracker = self.clone();
        Some(runtime.spawn(async move { tracker.push_completion(completion).await }))
    }

    async fn push_completion(&self, completion: LessonCompletion) {
        match self.inner.remote.upsert_completion(&completion).await {
            Ok(()) => tracing::debug!(
                learner = %completion.learner_id,
                lesson = %completion.lesson_id,
                "completion stored remotely"
            ),
            Err(err) => {
                let failure =
                    self.failure(ProgressOperation::RemoteWrite, ProgressError::from_remote(err));
                self.lock().record_failure(failure);
                self.notify();
            }
        }
    }

    //
    // ─── READS ────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn is_lesson_completed(&self, lesson_id: &LessonId) -> bool {
        self.lock().snapshot.contains(lesson_id)
    }

    /// Completion percentage in `0..=100`.
    ///
    /// With a non-empty `lesson_ids` the figure is per course: completed ids
    /// within that list over `total_lessons`. Without it (or with an empty
    /// list), every completed lesson counts, which is a global ratio rather than
    /// course progress; pass the course's ids whenever a per-course number is
    /// wanted.
    #[must_use]
    pub fn get_progress(
        &self,
        course_id: &CourseId,
        total_lessons: usize,
        lesson_ids: Option<&[LessonId]>,
    ) -> u8 {
        let state = self.lock();
        let completed = match lesson_ids {
            Some(ids) if !ids.is_empty() => state.snapshot.count_in(ids),
            _ => {
                tracing::debug!(course = %course_id, "no lesson ids given; using global count");
                state.snapshot.len()
            }
        };
        percentage(completed, total_lessons)
    }

    /// Every completed lesson over `total_lessons`, for catalog-wide figures.
    #[must_use]
    pub fn global_progress(&self, total_lessons: usize) -> u8 {
        percentage(self.lock().snapshot.len(), total_lessons)
    }

    /// Completed / total / percentage for a course's full lesson list.
    #[must_use]
    pub fn course_progress(&self, lesson_ids: &[LessonId]) -> CourseProgress {
        let completed = self.lock().snapshot.count_in(lesson_ids);
        CourseProgress::new(completed, lesson_ids.len())
    }

    /// Copy of the completed lesson ids, in snapshot order.
    #[must_use]
    pub fn completed_lessons(&self) -> Vec<LessonId> {
        self.lock().snapshot.to_vec()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    /// True from mount until the first reconciliation settles, and again
    /// during every later identity-driven reconciliation.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.lock().loading
    }

    #[must_use]
    pub fn phase(&self) -> TrackerPhase {
        self.lock().phase
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    /// Most recent absorbed failures, oldest first.
    #[must_use]
    pub fn recent_failures(&self) -> Vec<ProgressFailure> {
        self.lock().failures()
    }

    /// Receiver that ticks whenever tracker state changes, for re-rendering.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Wait until no reconciliation is in flight.
    pub async fn settled(&self) {
        let mut rx = self.subscribe();
        while self.loading() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
