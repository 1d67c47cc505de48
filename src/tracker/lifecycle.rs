use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::observer::{TrackerEvent, TrackerObserver};
use crate::registry::{self, OperationKind, Scope};
use crate::tracker::history::FailureHistory;
use crate::tracker::job::{JobFilter, JobId, JobRecord};
use crate::tracker::optimistic::{self, OptimisticHook};
use crate::tracker::projection::{restore_facet, JobProjection, JobView};
use crate::tracker::record::{
    OperationHandle, OperationId, OperationKey, OperationRecord, Outcome, Payload, Settlement,
};

type SettledTx = watch::Sender<Option<Settlement>>;
pub type SettledRx = watch::Receiver<Option<Settlement>>;

/// A record that has not resolved yet, plus what is needed to settle it.
struct InFlight {
    record: OperationRecord,
    settled: SettledTx,
    cancel: CancellationToken,
    /// Pre-operation copy of the job when an optimistic hook ran.
    rollback: Option<JobRecord>,
}

/// Tracks in-flight job operations and the confirmed job projection.
///
/// All methods are synchronous and never wait: the I/O for an operation
/// happens elsewhere and re-enters through [`resolve`](Self::resolve). Per job,
/// at most one record is pending for each conflicting group of kinds, so no
/// locking is needed inside the tracker itself.
pub struct LifecycleTracker {
    config: TrackerConfig,
    next_id: u64,
    in_flight: BTreeMap<OperationKey, InFlight>,
    by_id: HashMap<OperationId, OperationKey>,
    projection: JobProjection,
    failures: FailureHistory,
    hooks: HashMap<OperationKind, OptimisticHook>,
    observers: Vec<Arc<dyn TrackerObserver>>,
    events: broadcast::Sender<TrackerEvent>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl LifecycleTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let mut hooks = HashMap::new();
        if config.optimistic_defaults {
            for entry in registry::entries().filter(|e| e.idempotent) {
                if let Some(hook) = optimistic::default_for(entry.kind) {
                    hooks.insert(entry.kind, hook);
                }
            }
        }

        Self {
            failures: FailureHistory::new(config.failure_history_per_job, config.failure_retention),
            config,
            next_id: 1,
            in_flight: BTreeMap::new(),
            by_id: HashMap::new(),
            projection: JobProjection::new(),
            hooks,
            observers: Vec::new(),
            events,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn add_observer(&mut self, observer: Arc<dyn TrackerObserver>) {
        self.observers.push(observer);
    }

    /// Receive every event from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Register an optimistic edit for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `NotIdempotent` if the registry does not mark `kind` idempotent.
    pub fn set_optimistic(&mut self, kind: OperationKind, hook: OptimisticHook) -> Result<()> {
        if !registry::describe(kind).idempotent {
            return Err(TrackerError::NotIdempotent(kind));
        }
        self.hooks.insert(kind, hook);
        Ok(())
    }

    pub fn clear_optimistic(&mut self, kind: OperationKind) {
        self.hooks.remove(&kind);
    }

    /// Start tracking an operation.
    ///
    /// A pending record for the same `(job_id, kind)` is reused and the
    /// returned handle is marked coalesced; no second `started` is emitted.
    ///
    /// # Errors
    ///
    /// - `MissingJobId` / `UnexpectedJobId` if `job_id` does not match the
    ///   kind's scope.
    /// - `ConflictingOperation` if a conflicting kind is pending on the job.
    pub fn begin(&mut self, job_id: Option<JobId>, kind: OperationKind) -> Result<OperationHandle> {
        let entry = registry::describe(kind);
        match (entry.scope, &job_id) {
            (Scope::Single, None) => return Err(TrackerError::MissingJobId(kind)),
            (Scope::Collection, Some(_)) => return Err(TrackerError::UnexpectedJobId(kind)),
            _ => {}
        }

        let key = OperationKey {
            job_id: job_id.clone(),
            kind,
        };
        if let Some(existing) = self.in_flight.get(&key) {
            tracing::debug!(
                operation_id = %existing.record.id,
                kind = %kind,
                job_id = ?job_id.as_ref().map(JobId::as_str),
                "Coalesced with pending operation"
            );
            return Ok(OperationHandle::new(existing.record.id, job_id, kind, true));
        }

        if let Some(id) = &job_id {
            if let Some(blocking) = self
                .pending_kinds(id)
                .into_iter()
                .find(|other| entry.conflicts_with(registry::describe(*other)))
            {
                tracing::warn!(job_id = %id, requested = %kind, blocking = %blocking, "Conflicting operation rejected");
                return Err(TrackerError::ConflictingOperation {
                    job_id: id.clone(),
                    requested: kind,
                    blocking,
                });
            }
        }

        let operation_id = OperationId::new(self.next_id);
        self.next_id += 1;

        let rollback = self.apply_optimistic(kind, job_id.as_ref());
        let record = OperationRecord::pending(operation_id, job_id.clone(), kind);
        let (settled, _) = watch::channel(None);
        self.by_id.insert(operation_id, record.key());
        self.in_flight.insert(
            key,
            InFlight {
                record,
                settled,
                cancel: CancellationToken::new(),
                rollback,
            },
        );

        tracing::info!(
            operation_id = %operation_id,
            kind = %kind,
            job_id = ?job_id.as_ref().map(JobId::as_str),
            "Operation started"
        );
        self.emit(TrackerEvent::Started {
            operation_id,
            kind,
            job_id: job_id.clone(),
        });

        Ok(OperationHandle::new(operation_id, job_id, kind, false))
    }

    /// Apply the outcome of an operation and retire its record.
    ///
    /// Returns the finished record, or `None` when the handle no longer refers
    /// to a pending record (already resolved or cancelled). Stale outcomes
    /// have no effect.
    pub fn resolve(&mut self, handle: &OperationHandle, outcome: Outcome) -> Option<OperationRecord> {
        let Some(mut in_flight) = self.take(handle.id()) else {
            tracing::debug!(operation_id = %handle.id(), kind = %handle.kind(), "Ignoring stale resolution");
            return None;
        };

        let kind = in_flight.record.kind;
        let job_id = in_flight.record.job_id.clone();

        match outcome {
            Outcome::Success(payload) => {
                in_flight.record.succeed();
                self.drop_confirmed_rollbacks(kind, &payload);
                self.projection.merge(kind, job_id.as_ref(), payload.clone());
                tracing::info!(
                    operation_id = %in_flight.record.id,
                    kind = %kind,
                    job_id = ?job_id.as_ref().map(JobId::as_str),
                    "Operation succeeded"
                );
                self.emit(TrackerEvent::Succeeded {
                    operation_id: in_flight.record.id,
                    kind,
                    job_id,
                    payload: payload.clone(),
                });
                in_flight.settled.send_replace(Some(Ok(payload)));
            }
            Outcome::Failure(error) => {
                in_flight.record.fail(error.clone());
                self.settle_failure(&mut in_flight, error);
            }
        }

        self.prune_failures();
        Some(in_flight.record)
    }

    /// Cancel a pending operation.
    ///
    /// The record settles as `Failed(Cancelled)` straight away and any later
    /// `resolve` for it is ignored. Returns `false` if the handle was already
    /// settled, in which case nothing happens.
    pub fn cancel(&mut self, handle: &OperationHandle) -> bool {
        let Some(mut in_flight) = self.take(handle.id()) else {
            return false;
        };

        in_flight.cancel.cancel();
        in_flight.record.cancel();
        tracing::info!(
            operation_id = %in_flight.record.id,
            kind = %in_flight.record.kind,
            "Operation cancelled"
        );
        self.settle_failure(&mut in_flight, TrackerError::Cancelled);
        self.prune_failures();
        true
    }

    /// Cancel everything still pending. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let handles: Vec<OperationHandle> = self
            .in_flight
            .values()
            .map(|f| OperationHandle::new(f.record.id, f.record.job_id.clone(), f.record.kind, false))
            .collect();
        handles.iter().filter(|handle| self.cancel(handle)).count()
    }

    /// Watch for the settlement of a pending operation. `None` once settled.
    pub fn subscribe(&self, handle: &OperationHandle) -> Option<SettledRx> {
        self.in_flight_for(handle.id()).map(|f| f.settled.subscribe())
    }

    /// Token fired when the operation is cancelled, for the code running its I/O.
    pub fn cancellation_token(&self, handle: &OperationHandle) -> Option<CancellationToken> {
        self.in_flight_for(handle.id()).map(|f| f.cancel.clone())
    }

    /// The pending record behind a handle.
    pub fn record(&self, handle: &OperationHandle) -> Option<&OperationRecord> {
        self.in_flight_for(handle.id()).map(|f| &f.record)
    }

    /// Kinds with an unresolved record on this job.
    pub fn pending_kinds(&self, job_id: &JobId) -> BTreeSet<OperationKind> {
        let range = OperationKey {
            job_id: Some(job_id.clone()),
            kind: OperationKind::Create,
        }..=OperationKey {
            job_id: Some(job_id.clone()),
            kind: OperationKind::Unbookmark,
        };
        self.in_flight.range(range).map(|(key, _)| key.kind).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// View of one job, or `None` if the tracker knows nothing about it.
    pub fn snapshot(&self, job_id: &JobId) -> Option<JobView> {
        let record = self.projection.get(job_id).cloned();
        let pending_operations = self.pending_kinds(job_id);
        if record.is_none() && pending_operations.is_empty() {
            return None;
        }
        Some(JobView {
            job_id: job_id.clone(),
            record,
            pending_operations,
        })
    }

    /// Every known job: confirmed ones by creation time, then jobs that only
    /// have pending work (e.g. a create in flight).
    pub fn snapshot_all(&self) -> Vec<JobView> {
        let mut views: Vec<JobView> = self
            .projection
            .all_jobs()
            .into_iter()
            .map(|record| self.view_of(record))
            .collect();

        let unconfirmed: BTreeSet<&JobId> = self
            .in_flight
            .keys()
            .filter_map(|key| key.job_id.as_ref())
            .filter(|id| self.projection.get(id).is_none())
            .collect();
        views.extend(unconfirmed.into_iter().map(|id| JobView {
            job_id: id.clone(),
            record: None,
            pending_operations: self.pending_kinds(id),
        }));
        views
    }

    /// Confirmed jobs matching a local filter.
    pub fn snapshot_filtered(&self, filter: &JobFilter) -> Vec<JobView> {
        self.projection
            .filtered(filter)
            .into_iter()
            .map(|record| self.view_of(record))
            .collect()
    }

    pub fn projection(&self) -> &JobProjection {
        &self.projection
    }

    /// Failed records kept for a job, oldest first. `None` selects
    /// collection-scoped failures.
    pub fn failures(&self, job_id: Option<&JobId>) -> Vec<&OperationRecord> {
        self.failures.for_job(job_id)
    }

    pub fn last_failure(&self, job_id: Option<&JobId>) -> Option<&OperationRecord> {
        self.failures.last(job_id)
    }

    /// Evict failed records older than the retention window.
    pub fn prune_failures(&mut self) -> usize {
        let removed = self.failures.prune(Utc::now());
        if removed > 0 {
            tracing::trace!(removed, "Pruned expired failure records");
        }
        removed
    }

    fn view_of(&self, record: &JobRecord) -> JobView {
        JobView {
            job_id: record.id.clone(),
            record: Some(record.clone()),
            pending_operations: self.pending_kinds(&record.id),
        }
    }

    fn in_flight_for(&self, id: OperationId) -> Option<&InFlight> {
        self.by_id.get(&id).and_then(|key| self.in_flight.get(key))
    }

    fn take(&mut self, id: OperationId) -> Option<InFlight> {
        let key = self.by_id.remove(&id)?;
        self.in_flight.remove(&key)
    }

    fn apply_optimistic(&mut self, kind: OperationKind, job_id: Option<&JobId>) -> Option<JobRecord> {
        let hook = self.hooks.get(&kind)?;
        let job = self.projection.get_mut(job_id?)?;
        let before = job.clone();
        hook(job);
        Some(before)
    }

    /// Server data is about to replace these jobs, so optimistic edits still
    /// pending on them must not be copied back over it on failure.
    fn drop_confirmed_rollbacks(&mut self, kind: OperationKind, payload: &Payload) {
        let confirmed: Vec<&JobId> = match payload {
            Payload::Job(record) => vec![&record.id],
            Payload::Jobs(records) => records.iter().map(|r| &r.id).collect(),
            Payload::Ack => return,
        };
        let whole_collection = kind == OperationKind::FetchAll;

        for in_flight in self.in_flight.values_mut() {
            let Some(id) = in_flight.record.job_id.as_ref() else {
                continue;
            };
            if (whole_collection || confirmed.contains(&id)) && in_flight.rollback.take().is_some() {
                tracing::debug!(
                    operation_id = %in_flight.record.id,
                    job_id = %id,
                    "Optimistic edit superseded by confirmed data"
                );
            }
        }
    }

    /// Shared tail of a failed or cancelled record: undo optimistic edits,
    /// keep the record for inspection, notify.
    fn settle_failure(&mut self, in_flight: &mut InFlight, error: TrackerError) {
        let record = &in_flight.record;
        if let (Some(before), Some(id)) = (in_flight.rollback.take(), record.job_id.as_ref()) {
            if let Some(job) = self.projection.get_mut(id) {
                restore_facet(job, registry::describe(record.kind).facet, &before);
            }
        }

        tracing::warn!(
            operation_id = %record.id,
            kind = %record.kind,
            job_id = ?record.job_id.as_ref().map(JobId::as_str),
            error = %error,
            "Operation failed"
        );

        let evicted = self.failures.push(record.clone());
        if evicted > 0 {
            tracing::trace!(evicted, "Evicted old failure records");
        }

        self.emit(TrackerEvent::Failed {
            operation_id: record.id,
            kind: record.kind,
            job_id: record.job_id.clone(),
            error: error.clone(),
        });
        in_flight.settled.send_replace(Some(Err(error)));
    }

    fn emit(&self, event: TrackerEvent) {
        for observer in &self.observers {
            event.deliver(observer.as_ref());
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for LifecycleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleTracker")
            .field("pending", &self.in_flight.len())
            .field("jobs", &self.projection.len())
            .field("failures", &self.failures.len())
            .finish()
    }
}
