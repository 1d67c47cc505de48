//! Notifications for presentation layers.
//!
//! Every operation produces one `started` and then exactly one of
//! `succeeded` or `failed`, delivered in resolution order. Coalesced callers
//! do not produce a second `started`.

use serde::{Serialize, Serializer};

use crate::error::TrackerError;
use crate::registry::{ActionPhase, ActionType, OperationKind};
use crate::tracker::{JobId, OperationId, Payload};

pub trait TrackerObserver: Send + Sync {
    fn started(&self, _kind: OperationKind, _job_id: Option<&JobId>) {}

    fn succeeded(&self, _kind: OperationKind, _job_id: Option<&JobId>, _payload: &Payload) {}

    fn failed(&self, _kind: OperationKind, _job_id: Option<&JobId>, _error: &TrackerError) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    Started {
        operation_id: OperationId,
        kind: OperationKind,
        job_id: Option<JobId>,
    },
    Succeeded {
        operation_id: OperationId,
        kind: OperationKind,
        job_id: Option<JobId>,
        payload: Payload,
    },
    Failed {
        operation_id: OperationId,
        kind: OperationKind,
        job_id: Option<JobId>,
        #[serde(serialize_with = "serialize_display")]
        error: TrackerError,
    },
}

impl TrackerEvent {
    pub fn operation_id(&self) -> OperationId {
        match self {
            TrackerEvent::Started { operation_id, .. }
            | TrackerEvent::Succeeded { operation_id, .. }
            | TrackerEvent::Failed { operation_id, .. } => *operation_id,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            TrackerEvent::Started { kind, .. }
            | TrackerEvent::Succeeded { kind, .. }
            | TrackerEvent::Failed { kind, .. } => *kind,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            TrackerEvent::Started { job_id, .. }
            | TrackerEvent::Succeeded { job_id, .. }
            | TrackerEvent::Failed { job_id, .. } => job_id.as_ref(),
        }
    }

    /// The `*_REQUEST`, `*_SUCCESS` or `*_ERROR` identifier for this event.
    pub fn action_type(&self) -> ActionType {
        let phase = match self {
            TrackerEvent::Started { .. } => ActionPhase::Request,
            TrackerEvent::Succeeded { .. } => ActionPhase::Success,
            TrackerEvent::Failed { .. } => ActionPhase::Error,
        };
        ActionType::new(self.kind(), phase)
    }

    pub(crate) fn deliver(&self, observer: &dyn TrackerObserver) {
        match self {
            TrackerEvent::Started { kind, job_id, .. } => observer.started(*kind, job_id.as_ref()),
            TrackerEvent::Succeeded {
                kind,
                job_id,
                payload,
                ..
            } => observer.succeeded(*kind, job_id.as_ref(), payload),
            TrackerEvent::Failed {
                kind, job_id, error, ..
            } => observer.failed(*kind, job_id.as_ref(), error),
        }
    }
}

fn serialize_display<S: Serializer>(error: &TrackerError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Observer that logs every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl TrackerObserver for LoggingObserver {
    fn started(&self, kind: OperationKind, job_id: Option<&JobId>) {
        tracing::info!(
            action = %ActionType::new(kind, ActionPhase::Request),
            job_id = ?job_id.map(JobId::as_str),
            "Job operation requested"
        );
    }

    fn succeeded(&self, kind: OperationKind, job_id: Option<&JobId>, _payload: &Payload) {
        tracing::info!(
            action = %ActionType::new(kind, ActionPhase::Success),
            job_id = ?job_id.map(JobId::as_str),
            "Job operation succeeded"
        );
    }

    fn failed(&self, kind: OperationKind, job_id: Option<&JobId>, error: &TrackerError) {
        tracing::warn!(
            action = %ActionType::new(kind, ActionPhase::Error),
            job_id = ?job_id.map(JobId::as_str),
            error = %error,
            "Job operation failed"
        );
    }
}
