use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// The eleven job actions a client can issue against the job backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Delete,
    Stop,
    Archive,
    Restart,
    Restore,
    Update,
    Get,
    FetchAll,
    Bookmark,
    Unbookmark,
}

impl OperationKind {
    pub const ALL: [OperationKind; 11] = [
        OperationKind::Create,
        OperationKind::Delete,
        OperationKind::Stop,
        OperationKind::Archive,
        OperationKind::Restart,
        OperationKind::Restore,
        OperationKind::Update,
        OperationKind::Get,
        OperationKind::FetchAll,
        OperationKind::Bookmark,
        OperationKind::Unbookmark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::Stop => "stop",
            OperationKind::Archive => "archive",
            OperationKind::Restart => "restart",
            OperationKind::Restore => "restore",
            OperationKind::Update => "update",
            OperationKind::Get => "get",
            OperationKind::FetchAll => "fetch_all",
            OperationKind::Bookmark => "bookmark",
            OperationKind::Unbookmark => "unbookmark",
        }
    }

    /// Upper-case stem shared by the kind's three action identifiers.
    fn action_stem(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE_JOB",
            OperationKind::Delete => "DELETE_JOB",
            OperationKind::Stop => "STOP_JOB",
            OperationKind::Archive => "ARCHIVE_JOB",
            OperationKind::Restart => "RESTART_JOB",
            OperationKind::Restore => "RESTORE_JOB",
            OperationKind::Update => "UPDATE_JOB",
            OperationKind::Get => "GET_JOB",
            OperationKind::FetchAll => "FETCH_JOBS",
            OperationKind::Bookmark => "BOOKMARK_JOB",
            OperationKind::Unbookmark => "UNBOOKMARK_JOB",
        }
    }

    /// The `REQUEST`/`SUCCESS`/`ERROR` identifiers for this kind.
    pub fn action_types(&self) -> [ActionType; 3] {
        [
            ActionType::new(*self, ActionPhase::Request),
            ActionType::new(*self, ActionPhase::Success),
            ActionType::new(*self, ActionPhase::Error),
        ]
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TrackerError::UnknownOperationKind(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    Request,
    Success,
    Error,
}

impl ActionPhase {
    fn suffix(&self) -> &'static str {
        match self {
            ActionPhase::Request => "REQUEST",
            ActionPhase::Success => "SUCCESS",
            ActionPhase::Error => "ERROR",
        }
    }
}

/// A symbolic action identifier such as `STOP_JOB_REQUEST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionType {
    pub kind: OperationKind,
    pub phase: ActionPhase,
}

impl ActionType {
    pub fn new(kind: OperationKind, phase: ActionPhase) -> Self {
        Self { kind, phase }
    }

    /// All 33 identifiers, grouped by kind in declaration order.
    pub fn all() -> impl Iterator<Item = ActionType> {
        OperationKind::ALL
            .into_iter()
            .flat_map(|kind| kind.action_types())
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.action_stem(), self.phase.suffix())
    }
}

impl FromStr for ActionType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stem, suffix) = s
            .rsplit_once('_')
            .ok_or_else(|| TrackerError::UnknownOperationKind(s.to_string()))?;

        let phase = [ActionPhase::Request, ActionPhase::Success, ActionPhase::Error]
            .into_iter()
            .find(|phase| phase.suffix() == suffix);
        let kind = OperationKind::ALL
            .into_iter()
            .find(|kind| kind.action_stem() == stem);

        match (kind, phase) {
            (Some(kind), Some(phase)) => Ok(ActionType { kind, phase }),
            _ => Err(TrackerError::UnknownOperationKind(s.to_string())),
        }
    }
}

impl Serialize for ActionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
