pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod observer;
pub mod registry;
pub mod service;
pub mod tracker;

pub use coordinator::{JobCoordinator, PendingOperation};
pub use error::{Result, ServiceError, TrackerError};
pub use registry::{describe, OperationKind};
pub use tracker::LifecycleTracker;
