//! The job backend as seen by the coordinator.
//!
//! One async call per operation kind. Implementations own transport, auth and
//! any retry policy; a failed call is reported as a [`ServiceError`] and the
//! tracker never retries it.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::registry::OperationKind;
use crate::tracker::{JobId, JobPatch, ListQuery, NewJob, Payload};

/// Each call returns either the job's updated attributes, a listing, or a
/// bare acknowledgement.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn create_job(&self, job_id: &JobId, new_job: &NewJob) -> Result<Payload, ServiceError>;
    async fn delete_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn stop_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn archive_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn restart_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn restore_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn update_job(&self, job_id: &JobId, patch: &JobPatch) -> Result<Payload, ServiceError>;
    async fn get_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn fetch_jobs(&self, query: &ListQuery) -> Result<Payload, ServiceError>;
    async fn bookmark_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
    async fn unbookmark_job(&self, job_id: &JobId) -> Result<Payload, ServiceError>;
}

/// An operation together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Create { job_id: JobId, new_job: NewJob },
    Delete(JobId),
    Stop(JobId),
    Archive(JobId),
    Restart(JobId),
    Restore(JobId),
    Update { job_id: JobId, patch: JobPatch },
    Get(JobId),
    FetchAll(ListQuery),
    Bookmark(JobId),
    Unbookmark(JobId),
}

impl JobRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            JobRequest::Create { .. } => OperationKind::Create,
            JobRequest::Delete(_) => OperationKind::Delete,
            JobRequest::Stop(_) => OperationKind::Stop,
            JobRequest::Archive(_) => OperationKind::Archive,
            JobRequest::Restart(_) => OperationKind::Restart,
            JobRequest::Restore(_) => OperationKind::Restore,
            JobRequest::Update { .. } => OperationKind::Update,
            JobRequest::Get(_) => OperationKind::Get,
            JobRequest::FetchAll(_) => OperationKind::FetchAll,
            JobRequest::Bookmark(_) => OperationKind::Bookmark,
            JobRequest::Unbookmark(_) => OperationKind::Unbookmark,
        }
    }

    /// `None` only for `FetchAll`.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobRequest::Create { job_id, .. } | JobRequest::Update { job_id, .. } => Some(job_id),
            JobRequest::Delete(id)
            | JobRequest::Stop(id)
            | JobRequest::Archive(id)
            | JobRequest::Restart(id)
            | JobRequest::Restore(id)
            | JobRequest::Get(id)
            | JobRequest::Bookmark(id)
            | JobRequest::Unbookmark(id) => Some(id),
            JobRequest::FetchAll(_) => None,
        }
    }
}

/// Route a request to the matching service call.
pub async fn dispatch<S>(service: &S, request: &JobRequest) -> Result<Payload, ServiceError>
where
    S: JobService + ?Sized,
{
    match request {
        JobRequest::Create { job_id, new_job } => service.create_job(job_id, new_job).await,
        JobRequest::Delete(id) => service.delete_job(id).await,
        JobRequest::Stop(id) => service.stop_job(id).await,
        JobRequest::Archive(id) => service.archive_job(id).await,
        JobRequest::Restart(id) => service.restart_job(id).await,
        JobRequest::Restore(id) => service.restore_job(id).await,
        JobRequest::Update { job_id, patch } => service.update_job(job_id, patch).await,
        JobRequest::Get(id) => service.get_job(id).await,
        JobRequest::FetchAll(query) => service.fetch_jobs(query).await,
        JobRequest::Bookmark(id) => service.bookmark_job(id).await,
        JobRequest::Unbookmark(id) => service.unbookmark_job(id).await,
    }
}
