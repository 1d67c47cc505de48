pub mod history;
pub mod job;
pub mod lifecycle;
pub mod optimistic;
pub mod projection;
pub mod record;

pub use job::{JobFilter, JobId, JobPatch, JobRecord, JobStatus, ListQuery, NewJob};
pub use lifecycle::{LifecycleTracker, SettledRx};
pub use projection::{JobProjection, JobView};
pub use record::{
    OperationHandle, OperationId, OperationPhase, OperationRecord, Outcome, Payload, Settlement,
};
