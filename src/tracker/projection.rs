use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::registry::{Facet, OperationKind};
use crate::tracker::job::{JobFilter, JobId, JobRecord, JobStatus};
use crate::tracker::record::Payload;

/// Read-only view of one job: confirmed attributes plus in-flight work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    /// `None` until the backend has confirmed anything about the job.
    pub record: Option<JobRecord>,
    pub pending_operations: BTreeSet<OperationKind>,
}

impl JobView {
    pub fn status(&self) -> Option<JobStatus> {
        self.record.as_ref().map(|r| r.status)
    }

    pub fn is_busy(&self) -> bool {
        !self.pending_operations.is_empty()
    }
}

/// Server-confirmed job attributes keyed by job id.
#[derive(Debug, Default, Clone)]
pub struct JobProjection {
    jobs: HashMap<JobId, JobRecord>,
}

impl JobProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(id)
    }

    /// Replace the confirmed attributes of one job.
    pub fn upsert(&mut self, record: JobRecord) {
        self.jobs.insert(record.id.clone(), record);
    }

    pub fn remove(&mut self, id: &JobId) -> Option<JobRecord> {
        self.jobs.remove(id)
    }

    /// Swap in a whole new collection snapshot.
    pub fn replace_all(&mut self, records: Vec<JobRecord>) {
        self.jobs = records.into_iter().map(|r| (r.id.clone(), r)).collect();
    }

    /// All jobs sorted chronologically by creation time.
    pub fn all_jobs(&self) -> Vec<&JobRecord> {
        let mut jobs: Vec<&JobRecord> = self.jobs.values().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn filtered(&self, filter: &JobFilter) -> Vec<&JobRecord> {
        self.all_jobs()
            .into_iter()
            .filter(|job| filter.matches(job))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Merge a successful result into the projection.
    pub(crate) fn merge(&mut self, kind: OperationKind, job_id: Option<&JobId>, payload: Payload) {
        match (kind, payload) {
            (OperationKind::FetchAll, Payload::Jobs(records)) => self.replace_all(records),
            (OperationKind::FetchAll, Payload::Job(record)) => self.replace_all(vec![record]),
            (OperationKind::FetchAll, Payload::Ack) => {}
            (OperationKind::Delete, _) => {
                if let Some(id) = job_id {
                    self.remove(id);
                }
            }
            (_, Payload::Job(record)) => self.upsert(record),
            (_, Payload::Jobs(records)) => {
                for record in records {
                    self.upsert(record);
                }
            }
            (kind, Payload::Ack) => {
                if let Some(id) = job_id {
                    self.apply_ack(kind, id);
                }
            }
        }
    }

    /// Effect of a body-less success on the kind's facet.
    fn apply_ack(&mut self, kind: OperationKind, id: &JobId) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        match kind {
            OperationKind::Stop => job.status = JobStatus::Stopped,
            OperationKind::Archive => job.archived = true,
            OperationKind::Restore => job.archived = false,
            OperationKind::Bookmark => job.bookmarked = true,
            OperationKind::Unbookmark => job.bookmarked = false,
            _ => {}
        }
    }
}

/// Copy back the fields `facet` covers from a pre-operation copy.
pub(crate) fn restore_facet(job: &mut JobRecord, facet: Facet, before: &JobRecord) {
    match facet {
        Facet::Lifecycle => {
            job.status = before.status;
            job.archived = before.archived;
            job.started_at = before.started_at;
            job.finished_at = before.finished_at;
        }
        Facet::Bookmark => job.bookmarked = before.bookmarked,
        Facet::None => {
            job.name = before.name.clone();
            job.description = before.description.clone();
            job.tags = before.tags.clone();
        }
    }
    job.updated_at = before.updated_at;
}
