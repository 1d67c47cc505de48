use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Client-side id for a job that is about to be created.
    pub fn draft() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Building,
    Scheduled,
    Starting,
    Running,
    Succeeded,
    Failed,
    Stopped,
    Unknown,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Stopped
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            JobStatus::Building | JobStatus::Scheduled | JobStatus::Starting | JobStatus::Running
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Building => write!(f, "building"),
            JobStatus::Scheduled => write!(f, "scheduled"),
            JobStatus::Starting => write!(f, "starting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Stopped => write!(f, "stopped"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Last server-confirmed attributes of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub status: JobStatus,
    pub bookmarked: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(id: impl Into<JobId>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: None,
            description: None,
            user: None,
            project: None,
            tags: Vec::new(),
            status: JobStatus::Created,
            bookmarked: false,
            archived: false,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub name: Option<String>,
    pub description: Option<String>,
    pub project: Option<String>,
    pub tags: Vec<String>,
    /// Backend-specific job definition, passed through untouched.
    pub content: Option<String>,
}

/// Partial update; `None` fields are left unchanged by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Server-side listing parameters for `FetchAll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Backend query expression, e.g. `status:running,tags:gpu`.
    pub query: Option<String>,
    pub sort: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            query: None,
            sort: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Local filter over the confirmed projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub tag: Option<String>,
    pub bookmarked: Option<bool>,
    pub archived: Option<bool>,
}

impl JobFilter {
    pub fn matches(&self, job: &JobRecord) -> bool {
        self.status.map_or(true, |status| job.status == status)
            && self
                .tag
                .as_ref()
                .map_or(true, |tag| job.tags.iter().any(|t| t == tag))
            && self.bookmarked.map_or(true, |b| job.bookmarked == b)
            && self.archived.map_or(true, |a| job.archived == a)
    }
}
