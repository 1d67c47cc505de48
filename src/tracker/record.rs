use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TrackerError;
use crate::registry::OperationKind;
use crate::tracker::job::{JobId, JobRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl OperationId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Key of an in-flight record: at most one unresolved record per pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct OperationKey {
    pub job_id: Option<JobId>,
    pub kind: OperationKind,
}

/// Caller-side reference to an operation record.
///
/// Coalesced callers receive a handle to the record that was already in
/// flight; two handles are equal when they refer to the same record.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    id: OperationId,
    job_id: Option<JobId>,
    kind: OperationKind,
    coalesced: bool,
}

impl OperationHandle {
    pub(crate) fn new(
        id: OperationId,
        job_id: Option<JobId>,
        kind: OperationKind,
        coalesced: bool,
    ) -> Self {
        Self {
            id,
            job_id,
            kind,
            coalesced,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// True when this handle joined an operation that was already pending.
    pub fn is_coalesced(&self) -> bool {
        self.coalesced
    }
}

impl PartialEq for OperationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OperationHandle {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Pending,
    Cancelled,
    Succeeded,
    Failed,
}

impl OperationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationPhase::Succeeded | OperationPhase::Failed)
    }
}

/// What the collaborator handed back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Authoritative attributes of one job.
    Job(JobRecord),
    /// A listing; replaces the collection when the kind is `FetchAll`.
    Jobs(Vec<JobRecord>),
    /// The backend accepted the request without a body.
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Payload),
    Failure(TrackerError),
}

impl<E: Into<TrackerError>> From<std::result::Result<Payload, E>> for Outcome {
    fn from(result: std::result::Result<Payload, E>) -> Self {
        match result {
            Ok(payload) => Outcome::Success(payload),
            Err(err) => Outcome::Failure(err.into()),
        }
    }
}

/// How a finished record ended, as seen by everyone waiting on it.
pub type Settlement = std::result::Result<Payload, TrackerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub id: OperationId,
    pub job_id: Option<JobId>,
    pub kind: OperationKind,
    pub phase: OperationPhase,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub error: Option<TrackerError>,
}

impl OperationRecord {
    pub(crate) fn pending(id: OperationId, job_id: Option<JobId>, kind: OperationKind) -> Self {
        Self {
            id,
            job_id,
            kind,
            phase: OperationPhase::Pending,
            started_at: Utc::now(),
            resolved_at: None,
            error: None,
        }
    }

    pub(crate) fn key(&self) -> OperationKey {
        OperationKey {
            job_id: self.job_id.clone(),
            kind: self.kind,
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.phase = OperationPhase::Succeeded;
        self.resolved_at = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: TrackerError) {
        self.phase = OperationPhase::Failed;
        self.error = Some(error);
        self.resolved_at = Some(Utc::now());
    }

    /// `Pending -> Cancelled -> Failed(Cancelled)`.
    pub(crate) fn cancel(&mut self) {
        self.phase = OperationPhase::Cancelled;
        self.fail(TrackerError::Cancelled);
    }
}
