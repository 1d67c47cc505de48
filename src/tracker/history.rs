use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::tracker::job::JobId;
use crate::tracker::record::OperationRecord;

/// Most-recent failed records per job, evicted FIFO.
///
/// Collection-scoped failures are kept under the `None` key.
#[derive(Debug)]
pub struct FailureHistory {
    per_job: HashMap<Option<JobId>, VecDeque<OperationRecord>>,
    capacity: usize,
    retention: Option<Duration>,
}

impl FailureHistory {
    pub fn new(capacity: usize, retention: Option<Duration>) -> Self {
        Self {
            per_job: HashMap::new(),
            capacity,
            retention,
        }
    }

    /// Store a failed record. Returns how many older records were evicted.
    pub fn push(&mut self, record: OperationRecord) -> usize {
        if self.capacity == 0 {
            return 1;
        }
        let entries = self.per_job.entry(record.job_id.clone()).or_default();
        entries.push_back(record);
        let mut evicted = 0;
        while entries.len() > self.capacity {
            entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Failures for a job still inside the retention window, oldest first.
    pub fn for_job(&self, job_id: Option<&JobId>) -> Vec<&OperationRecord> {
        let cutoff = self.cutoff(Utc::now());
        self.per_job
            .get(&job_id.cloned())
            .map(|entries| entries.iter().filter(|r| retained(r, cutoff)).collect())
            .unwrap_or_default()
    }

    pub fn last(&self, job_id: Option<&JobId>) -> Option<&OperationRecord> {
        let cutoff = self.cutoff(Utc::now());
        self.per_job
            .get(&job_id.cloned())
            .and_then(|entries| entries.back())
            .filter(|r| retained(r, cutoff))
    }

    /// Drop records resolved longer ago than the retention window.
    /// Returns the number of records removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = self.cutoff(now) else {
            return 0;
        };

        let mut removed = 0;
        for entries in self.per_job.values_mut() {
            let before = entries.len();
            entries.retain(|r| retained(r, Some(cutoff)));
            removed += before - entries.len();
        }
        self.per_job.retain(|_, entries| !entries.is_empty());
        removed
    }

    fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = chrono::Duration::from_std(self.retention?).ok()?;
        Some(now - window)
    }

    pub fn len(&self) -> usize {
        self.per_job.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.per_job.is_empty()
    }
}

fn retained(record: &OperationRecord, cutoff: Option<DateTime<Utc>>) -> bool {
    match (cutoff, record.resolved_at) {
        (Some(cutoff), Some(at)) => at >= cutoff,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::registry::OperationKind;
    use crate::tracker::record::OperationId;

    fn failed(id: u64, job: &str) -> OperationRecord {
        let mut record =
            OperationRecord::pending(OperationId::new(id), Some(JobId::from(job)), OperationKind::Stop);
        record.fail(TrackerError::Cancelled);
        record
    }

    #[test]
    fn keeps_most_recent_per_job() {
        let mut history = FailureHistory::new(2, None);
        assert_eq!(history.push(failed(1, "a")), 0);
        assert_eq!(history.push(failed(2, "a")), 0);
        assert_eq!(history.push(failed(3, "a")), 1);
        history.push(failed(4, "b"));

        let a = JobId::from("a");
        let ids: Vec<OperationId> = history.for_job(Some(&a)).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![OperationId::new(2), OperationId::new(3)]);
        assert_eq!(history.last(Some(&a)).unwrap().id, OperationId::new(3));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = FailureHistory::new(0, None);
        history.push(failed(1, "a"));
        assert!(history.is_empty());
    }

    #[test]
    fn prune_drops_records_outside_retention() {
        let mut history = FailureHistory::new(5, Some(Duration::from_secs(60)));
        let mut old = failed(1, "a");
        old.resolved_at = Some(Utc::now() - chrono::Duration::seconds(120));
        history.push(old);
        history.push(failed(2, "a"));

        assert_eq!(history.prune(Utc::now()), 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.last(Some(&JobId::from("a"))).unwrap().id, OperationId::new(2));
    }

    #[test]
    fn expired_records_are_hidden_before_prune() {
        let mut history = FailureHistory::new(5, Some(Duration::from_secs(60)));
        let mut old = failed(1, "a");
        old.resolved_at = Some(Utc::now() - chrono::Duration::seconds(120));
        history.push(old);

        let a = JobId::from("a");
        assert!(history.for_job(Some(&a)).is_empty());
        assert!(history.last(Some(&a)).is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn prune_without_retention_is_noop() {
        let mut history = FailureHistory::new(5, None);
        let mut old = failed(1, "a");
        old.resolved_at = Some(Utc::now() - chrono::Duration::days(30));
        history.push(old);
        assert_eq!(history.prune(Utc::now()), 0);
        assert_eq!(history.len(), 1);
    }
}
