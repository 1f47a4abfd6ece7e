//! Sync engine: dirty sweep, offline queue drain, and conflict resolution.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::notifier::{ConflictEvent, ConflictNotifier};
use super::{ResolveOutcome, SyncOutcome, SyncReport};
use crate::clock::Clock;
use crate::config::SyncSettings;
use crate::conflict::{decide, SyncDecision};
use crate::db::LocalStore;
use crate::error::{Error, Result};
use crate::models::{DiagramId, DiagramRecord, QueuedOp, Resolution, SyncAction};
use crate::remote::{RemoteError, RemoteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassMode {
    /// Dirty records only
    Sweep,
    /// Dirty records, records at the retry cap, then the offline queue
    Full,
    /// Offline queue only
    Queue,
}

impl PassMode {
    const fn sweeps(self) -> bool {
        matches!(self, Self::Sweep | Self::Full)
    }

    const fn drains(self) -> bool {
        matches!(self, Self::Full | Self::Queue)
    }
}

/// What happened to one record.
#[derive(Debug)]
enum Step {
    Created,
    Pushed,
    InSync,
    Conflict,
    Failed(RemoteError),
    /// Stop the rest of the pass.
    Stop(RemoteError),
}

enum OpStep {
    Done,
    Pending,
    Stop(RemoteError),
}

/// Clears the in-progress flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reconciles a [`LocalStore`] against an optional [`RemoteStore`].
///
/// The engine is the only writer of `dirty` and `retry_count` after an edit.
/// A missing remote means local-only mode: every pass returns
/// [`SyncOutcome::LocalOnly`].
pub struct SyncEngine<L, R, C> {
    store: L,
    remote: Option<R>,
    clock: C,
    settings: SyncSettings,
    notifier: ConflictNotifier,
    awaiting: Mutex<HashMap<DiagramId, ConflictEvent>>,
    in_progress: AtomicBool,
    /// Set while passes keep aborting on the reachability check
    remote_down: AtomicBool,
}

impl<L, R, C> SyncEngine<L, R, C>
where
    L: LocalStore,
    R: RemoteStore,
    C: Clock,
{
    pub fn new(store: L, remote: Option<R>, clock: C, settings: SyncSettings) -> Self {
        Self {
            store,
            remote,
            clock,
            settings,
            notifier: ConflictNotifier::default(),
            awaiting: Mutex::new(HashMap::new()),
            in_progress: AtomicBool::new(false),
            remote_down: AtomicBool::new(false),
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub const fn store(&self) -> &L {
        &self.store
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Receive every conflict detected from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConflictEvent> {
        self.notifier.subscribe()
    }

    /// Ids excluded from automatic sync until [`Self::resolve`] is called.
    pub fn awaiting_resolution(&self) -> Vec<DiagramId> {
        let mut ids = self.lock_awaiting().keys().cloned().collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Push dirty records. Runs every sweep interval.
    pub async fn sync_dirty(&self) -> Result<SyncOutcome> {
        self.run_pass(PassMode::Sweep).await
    }

    /// Push dirty records, retry capped ones, then drain the offline queue.
    pub async fn sync_all(&self) -> Result<SyncOutcome> {
        self.run_pass(PassMode::Full).await
    }

    /// User-triggered full pass.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        tracing::info!("Manual sync requested");
        self.sync_all().await
    }

    /// Attempt queued remote operations only, leaving dirty records to the
    /// sweep. Used right after a local delete.
    pub async fn drain_queue(&self) -> Result<SyncOutcome> {
        self.run_pass(PassMode::Queue).await
    }

    /// Run sweep and full passes on their intervals until `shutdown` completes.
    ///
    /// Both timers are driven from this task; a pass that fails on the local
    /// store is logged and the loop keeps going.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut sweep = tokio::time::interval(self.settings.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut full = tokio::time::interval(self.settings.full_interval());
        full.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            "Sync loop started (sweep every {:?}, full pass every {:?})",
            self.settings.sweep_interval(),
            self.settings.full_interval()
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = full.tick() => log_pass("full", self.sync_all().await),
                _ = sweep.tick() => log_pass("sweep", self.sync_dirty().await),
            }
        }

        tracing::info!("Sync loop stopped");
    }

    /// Apply the user's choice for a diagram in conflict.
    ///
    /// The id leaves the awaiting set whatever happens, so a failed resolution
    /// falls back to the regular retry path.
    pub async fn resolve(&self, id: &DiagramId, resolution: Resolution) -> Result<ResolveOutcome> {
        let Some(remote) = &self.remote else {
            return Err(RemoteError::InvalidConfiguration(
                "remote sync is not configured".to_string(),
            )
            .into());
        };
        let cached = self.lock_awaiting().remove(id);

        let outcome = match resolution {
            Resolution::Local => self.keep_local(remote, id).await?,
            Resolution::Cloud => self.keep_cloud(remote, id, cached).await?,
        };

        match &outcome {
            ResolveOutcome::Applied => {
                self.store
                    .resolve_conflicts(id, resolution, self.clock.now_ms())
                    .await?;
                tracing::info!("Resolved conflict on diagram {} ({})", id, resolution);
            }
            ResolveOutcome::RetryScheduled(error) => {
                tracing::warn!(
                    "Resolution of diagram {} ({}) not applied: {}",
                    id,
                    resolution,
                    error
                );
            }
        }
        Ok(outcome)
    }

    async fn run_pass(&self, mode: PassMode) -> Result<SyncOutcome> {
        let Some(remote) = &self.remote else {
            return Ok(SyncOutcome::LocalOnly);
        };
        let Some(_guard) = self.begin_pass() else {
            tracing::debug!("Sync pass already running; skipping tick");
            return Ok(SyncOutcome::Skipped);
        };

        let mut report = SyncReport::default();
        let candidates = if mode.sweeps() {
            self.sweep_candidates(mode, &mut report).await?
        } else {
            Vec::new()
        };
        let queued = if mode.drains() {
            self.store.pending_ops().await?
        } else {
            Vec::new()
        };
        if candidates.is_empty() && queued.is_empty() {
            return Ok(SyncOutcome::Completed(report));
        }

        if let Err(error) = remote.verify_accessible().await {
            // Warn once per outage; the sweep retries every second.
            if self.remote_down.swap(true, Ordering::AcqRel) {
                tracing::debug!("Sync pass aborted: {} ({})", error, error.hint());
            } else {
                tracing::warn!("Sync pass aborted: {} ({})", error, error.hint());
            }
            return Ok(SyncOutcome::Aborted(error));
        }
        if self.remote_down.swap(false, Ordering::AcqRel) {
            tracing::info!("Remote is reachable again; resuming sync");
        }

        let mut attempted = HashSet::with_capacity(candidates.len());
        for record in candidates {
            attempted.insert(record.id.clone());
            match self.sync_record(remote, record).await? {
                Step::Created => report.created += 1,
                Step::Pushed => report.pushed += 1,
                Step::InSync => report.in_sync += 1,
                Step::Conflict => report.conflicts += 1,
                Step::Failed(_) => report.failed += 1,
                Step::Stop(reason) => {
                    report.interrupted = Some(reason);
                    break;
                }
            }
        }

        if report.interrupted.is_none() {
            self.drain(remote, queued, &attempted, &mut report).await?;
        }

        if !report.is_idle() {
            tracing::info!("Sync pass finished: {}", report);
        }
        Ok(SyncOutcome::Completed(report))
    }

    fn begin_pass(&self) -> Option<PassGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard(&self.in_progress))
    }

    /// Dirty records this pass should attempt.
    async fn sweep_candidates(
        &self,
        mode: PassMode,
        report: &mut SyncReport,
    ) -> Result<Vec<DiagramRecord>> {
        let dirty = self.store.list_dirty().await?;
        let awaiting = self.lock_awaiting();

        let mut candidates = Vec::with_capacity(dirty.len());
        for record in dirty {
            if awaiting.contains_key(&record.id) {
                report.awaiting += 1;
            } else if mode == PassMode::Sweep && record.retry_count >= self.settings.retry_cap {
                report.deferred += 1;
            } else {
                candidates.push(record);
            }
        }
        Ok(candidates)
    }

    async fn sync_record(&self, remote: &R, record: DiagramRecord) -> Result<Step> {
        let counterpart = if record.id.is_temporary() {
            None
        } else {
            match remote.fetch_by_id(&record.id).await {
                Ok(found) => found,
                Err(error) => return self.fail_record(&record.id, error).await,
            }
        };

        let decision = decide(&record, counterpart.as_ref());
        tracing::debug!("Diagram {}: {}", record.id, decision);

        match (decision, counterpart) {
            (SyncDecision::Conflict, Some(cloud)) => {
                self.raise_conflict(record, cloud).await?;
                Ok(Step::Conflict)
            }
            (SyncDecision::InSync, _) => {
                self.confirm(&record).await?;
                Ok(Step::InSync)
            }
            (SyncDecision::Push, _) => match remote.update(&record).await {
                Ok(()) => {
                    self.confirm(&record).await?;
                    Ok(Step::Pushed)
                }
                Err(error) => self.fail_record(&record.id, error).await,
            },
            (SyncDecision::Create | SyncDecision::Conflict, _) => {
                self.create_remote(remote, &record).await
            }
        }
    }

    async fn create_remote(&self, remote: &R, record: &DiagramRecord) -> Result<Step> {
        let created = match remote.create(record).await {
            Ok(created) => created,
            Err(error) => return self.fail_record(&record.id, error).await,
        };

        if created.id == record.id {
            self.confirm(record).await?;
            return Ok(Step::Created);
        }

        match self
            .store
            .replace_id(&record.id, &created.id, record.updated_at)
            .await?
        {
            Some(migrated) if migrated.dirty => {
                tracing::debug!(
                    "Diagram {} edited during create; {} stays dirty",
                    record.id,
                    migrated.id
                );
            }
            Some(migrated) => {
                tracing::debug!("Diagram {} is now {}", record.id, migrated.id);
            }
            None => {
                // Deleted locally while the create was in flight.
                self.store
                    .enqueue_op(&created.id, SyncAction::Delete, self.clock.now_ms())
                    .await?;
            }
        }
        Ok(Step::Created)
    }

    /// Clear `dirty` unless the record changed after it was read.
    async fn confirm(&self, record: &DiagramRecord) -> Result<()> {
        if !self
            .store
            .mark_synced(&record.id, record.updated_at)
            .await?
        {
            tracing::debug!("Diagram {} changed during sync; left dirty", record.id);
        }
        Ok(())
    }

    async fn raise_conflict(&self, local: DiagramRecord, cloud: DiagramRecord) -> Result<()> {
        self.store
            .record_conflict(
                &local.id,
                local.updated_at,
                cloud.updated_at,
                self.clock.now_ms(),
            )
            .await?;

        let id = local.id.clone();
        let event = ConflictEvent { local, cloud };
        self.lock_awaiting().insert(id.clone(), event.clone());
        let receivers = self.notifier.publish(event);
        tracing::info!(
            "Conflict on diagram {} (remote is newer, {} subscriber(s) notified)",
            id,
            receivers
        );
        Ok(())
    }

    /// Classify a remote failure for one record.
    ///
    /// Credential and table problems stop the pass without touching the record.
    /// Transient failures count against the record; connectivity loss also
    /// stops the pass, anything else lets it move on.
    async fn fail_record(&self, id: &DiagramId, error: RemoteError) -> Result<Step> {
        if !error.is_transient() {
            tracing::warn!("Sync stopped at diagram {}: {} ({})", id, error, error.hint());
            return Ok(Step::Stop(error));
        }

        self.count_failure(id, &error).await?;
        if error.is_pass_level() {
            Ok(Step::Stop(error))
        } else {
            Ok(Step::Failed(error))
        }
    }

    async fn count_failure(&self, id: &DiagramId, error: &RemoteError) -> Result<()> {
        match self.store.record_failure(id, self.settings.retry_cap).await {
            Ok(attempts) => tracing::warn!(
                "Sync of diagram {} failed (attempt {}/{}): {}",
                id,
                attempts,
                self.settings.retry_cap,
                error
            ),
            Err(Error::NotFound(_)) => {
                tracing::debug!("Diagram {} deleted during sync", id);
                return Ok(());
            }
            Err(error) => return Err(error),
        }
        self.queue_save(id).await
    }

    async fn queue_save(&self, id: &DiagramId) -> Result<()> {
        let already_queued = self
            .store
            .pending_ops()
            .await?
            .iter()
            .any(|op| op.record_id == *id && op.action == SyncAction::Save);
        if !already_queued {
            self.store
                .enqueue_op(id, SyncAction::Save, self.clock.now_ms())
                .await?;
        }
        Ok(())
    }

    async fn drain(
        &self,
        remote: &R,
        ops: Vec<QueuedOp>,
        attempted: &HashSet<DiagramId>,
        report: &mut SyncReport,
    ) -> Result<()> {
        for op in ops {
            match self.apply_op(remote, &op, attempted).await? {
                OpStep::Done => {
                    self.store.remove_op(op.id).await?;
                    report.queue_completed += 1;
                }
                OpStep::Pending => report.queue_pending += 1,
                OpStep::Stop(reason) => {
                    report.queue_pending += 1;
                    report.interrupted = Some(reason);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Run one queued operation. Saves for records already attempted by this
    /// pass's sweep are not retried a second time.
    async fn apply_op(
        &self,
        remote: &R,
        op: &QueuedOp,
        attempted: &HashSet<DiagramId>,
    ) -> Result<OpStep> {
        match op.action {
            SyncAction::Save => {
                let Some(record) = self.store.get(&op.record_id).await? else {
                    tracing::debug!("Queued save for missing diagram {}; dropping", op.record_id);
                    return Ok(OpStep::Done);
                };
                if !record.dirty {
                    return Ok(OpStep::Done);
                }
                if attempted.contains(&record.id) || self.lock_awaiting().contains_key(&record.id)
                {
                    return Ok(OpStep::Pending);
                }
                Ok(match self.sync_record(remote, record).await? {
                    Step::Created | Step::Pushed | Step::InSync => OpStep::Done,
                    Step::Conflict | Step::Failed(_) => OpStep::Pending,
                    Step::Stop(reason) => OpStep::Stop(reason),
                })
            }
            SyncAction::Delete => {
                if op.record_id.is_temporary() {
                    return Ok(OpStep::Done);
                }
                match remote.delete_by_id(&op.record_id).await {
                    Ok(()) => {
                        tracing::debug!("Deleted remote diagram {}", op.record_id);
                        Ok(OpStep::Done)
                    }
                    Err(error) if error.is_pass_level() => Ok(OpStep::Stop(error)),
                    Err(error) => {
                        tracing::warn!(
                            "Queued delete of diagram {} failed: {}",
                            op.record_id,
                            error
                        );
                        Ok(OpStep::Pending)
                    }
                }
            }
        }
    }

    async fn keep_local(&self, remote: &R, id: &DiagramId) -> Result<ResolveOutcome> {
        let local = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let step = match remote.update(&local).await {
            Ok(()) => {
                self.confirm(&local).await?;
                Step::Pushed
            }
            Err(RemoteError::NotFound(_)) => self.create_remote(remote, &local).await?,
            Err(error) => self.fail_record(id, error).await?,
        };

        Ok(match step {
            Step::Failed(error) | Step::Stop(error) => ResolveOutcome::RetryScheduled(error),
            Step::Created | Step::Pushed | Step::InSync | Step::Conflict => {
                ResolveOutcome::Applied
            }
        })
    }

    async fn keep_cloud(
        &self,
        remote: &R,
        id: &DiagramId,
        cached: Option<ConflictEvent>,
    ) -> Result<ResolveOutcome> {
        let cloud = match cached {
            Some(event) => event.cloud,
            None => match remote.fetch_by_id(id).await {
                Ok(Some(cloud)) => cloud,
                Ok(None) => {
                    return Err(Error::NotFound(format!("remote copy of diagram {id}")));
                }
                Err(error) => return Ok(ResolveOutcome::RetryScheduled(error)),
            },
        };

        self.store
            .put(&DiagramRecord {
                id: id.clone(),
                dirty: false,
                retry_count: 0,
                ..cloud
            })
            .await?;
        Ok(ResolveOutcome::Applied)
    }

    fn lock_awaiting(&self) -> MutexGuard<'_, HashMap<DiagramId, ConflictEvent>> {
        self.awaiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_pass(kind: &str, outcome: Result<SyncOutcome>) {
    match outcome {
        Ok(SyncOutcome::Aborted(reason)) => {
            tracing::debug!("{} pass aborted: {}", kind, reason);
        }
        Ok(_) => {}
        Err(error) => tracing::error!("{} pass failed on the local store: {}", kind, error),
    }
}
