//! Optimistic edits applied to a job before its operation settles.
//!
//! Only idempotent kinds may carry a hook. If the operation fails or is
//! cancelled, the facet the kind owns is copied back from the pre-operation
//! record.

use crate::registry::OperationKind;
use crate::tracker::job::{JobRecord, JobStatus};

pub type OptimisticHook = Box<dyn Fn(&mut JobRecord) + Send + Sync>;

pub fn bookmark() -> OptimisticHook {
    Box::new(|job| job.bookmarked = true)
}

pub fn unbookmark() -> OptimisticHook {
    Box::new(|job| job.bookmarked = false)
}

pub fn archive() -> OptimisticHook {
    Box::new(|job| job.archived = true)
}

pub fn restore() -> OptimisticHook {
    Box::new(|job| job.archived = false)
}

pub fn stop() -> OptimisticHook {
    Box::new(|job| job.status = JobStatus::Stopped)
}

/// The built-in hook for a kind, if there is one.
pub fn default_for(kind: OperationKind) -> Option<OptimisticHook> {
    match kind {
        OperationKind::Bookmark => Some(bookmark()),
        OperationKind::Unbookmark => Some(unbookmark()),
        OperationKind::Archive => Some(archive()),
        OperationKind::Restore => Some(restore()),
        OperationKind::Stop => Some(stop()),
        _ => None,
    }
}
