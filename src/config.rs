use std::time::Duration;

/// Bookkeeping limits for the lifecycle tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Failed records kept per job for inspection. Older ones are evicted FIFO.
    pub failure_history_per_job: usize,

    /// Failed records older than this are dropped on the next prune.
    /// `None` keeps them until evicted by count.
    pub failure_retention: Option<Duration>,

    /// Buffer size of the event broadcast channel. Slow subscribers that fall
    /// further behind than this miss events.
    pub event_capacity: usize,

    /// Install the built-in optimistic hooks for idempotent kinds at
    /// construction. Off by default: results are applied only once confirmed.
    pub optimistic_defaults: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            failure_history_per_job: 5,
            failure_retention: Some(Duration::from_secs(300)),
            event_capacity: 256,
            optimistic_defaults: false,
        }
    }
}

impl TrackerConfig {
    pub fn with_failure_history(mut self, per_job: usize) -> Self {
        self.failure_history_per_job = per_job;
        self
    }

    pub fn with_failure_retention(mut self, retention: Option<Duration>) -> Self {
        self.failure_retention = retention;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_optimistic_defaults(mut self, enabled: bool) -> Self {
        self.optimistic_defaults = enabled;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub tracker: TrackerConfig,

    /// Upper bound on a single collaborator call. A call that runs longer
    /// settles as a transport failure. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    pub fn new(tracker: TrackerConfig) -> Self {
        Self {
            tracker,
            ..Default::default()
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}
