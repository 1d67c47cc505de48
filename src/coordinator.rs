//! Async driver that pairs the tracker with a [`JobService`].
//!
//! The coordinator begins an operation on the tracker, spawns the matching
//! service call, and feeds the result back through `resolve`. The tracker lock
//! is held only for those synchronous steps, never across the call itself, so
//! any number of operations can be in flight at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::error::{Result, ServiceError, TrackerError};
use crate::observer::{TrackerEvent, TrackerObserver};
use crate::service::{dispatch, JobRequest, JobService};
use crate::tracker::{
    JobId, JobPatch, JobView, LifecycleTracker, ListQuery, NewJob, OperationHandle, Outcome,
    Payload, SettledRx,
};

/// An operation that has been handed to the service.
#[derive(Debug)]
pub struct PendingOperation {
    handle: OperationHandle,
    settled: SettledRx,
}

impl PendingOperation {
    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    /// Wait for the operation to settle. Coalesced callers get the same
    /// settlement as the caller that started the operation.
    pub async fn wait(mut self) -> Result<Payload> {
        let settled = self
            .settled
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TrackerError::Shutdown)?;
        let value = (*settled).clone();
        drop(settled);
        value.unwrap_or(Err(TrackerError::Shutdown))
    }
}

pub struct JobCoordinator<S> {
    tracker: Arc<RwLock<LifecycleTracker>>,
    service: Arc<S>,
    call_timeout: Option<Duration>,
}

impl<S: JobService + 'static> JobCoordinator<S> {
    pub fn new(service: Arc<S>, config: CoordinatorConfig) -> Self {
        Self {
            tracker: Arc::new(RwLock::new(LifecycleTracker::new(config.tracker))),
            service,
            call_timeout: config.call_timeout,
        }
    }

    pub fn tracker(&self) -> Arc<RwLock<LifecycleTracker>> {
        self.tracker.clone()
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub async fn add_observer(&self, observer: Arc<dyn TrackerObserver>) {
        self.tracker.write().await.add_observer(observer);
    }

    pub async fn subscribe_events(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tracker.read().await.subscribe_events()
    }

    /// Begin an operation and start its service call in the background.
    ///
    /// Returns as soon as the tracker has accepted the operation. A request
    /// that coalesces with one already in flight does not call the service
    /// again.
    ///
    /// # Errors
    ///
    /// Scope and conflict errors from [`LifecycleTracker::begin`].
    pub async fn submit(&self, request: JobRequest) -> Result<PendingOperation> {
        let (handle, settled, token) = {
            let mut tracker = self.tracker.write().await;
            let handle = tracker.begin(request.job_id().cloned(), request.kind())?;
            let settled = tracker.subscribe(&handle).ok_or(TrackerError::Shutdown)?;
            let token = tracker.cancellation_token(&handle);
            (handle, settled, token)
        };

        if !handle.is_coalesced() {
            if let Some(token) = token {
                self.spawn_call(request, handle.clone(), token);
            }
        }

        Ok(PendingOperation { handle, settled })
    }

    /// Submit and wait for the settlement.
    pub async fn execute(&self, request: JobRequest) -> Result<Payload> {
        self.submit(request).await?.wait().await
    }

    /// Cancel an in-flight operation. The pending service call is dropped;
    /// if the backend already acted on it, that effect is not undone.
    /// Cancelling a settled handle does nothing and returns `false`.
    pub async fn cancel(&self, handle: &OperationHandle) -> bool {
        self.tracker.write().await.cancel(handle)
    }

    /// Cancel everything in flight.
    pub async fn shutdown(&self) -> usize {
        let cancelled = self.tracker.write().await.cancel_all();
        tracing::info!(cancelled, "Coordinator shut down");
        cancelled
    }

    pub async fn snapshot(&self, job_id: &JobId) -> Option<JobView> {
        self.tracker.read().await.snapshot(job_id)
    }

    pub async fn snapshot_all(&self) -> Vec<JobView> {
        self.tracker.read().await.snapshot_all()
    }

    pub async fn create(&self, job_id: JobId, new_job: NewJob) -> Result<Payload> {
        self.execute(JobRequest::Create { job_id, new_job }).await
    }

    pub async fn delete(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Delete(job_id.into())).await
    }

    pub async fn stop(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Stop(job_id.into())).await
    }

    pub async fn archive(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Archive(job_id.into())).await
    }

    pub async fn restart(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Restart(job_id.into())).await
    }

    pub async fn restore(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Restore(job_id.into())).await
    }

    pub async fn update(&self, job_id: impl Into<JobId>, patch: JobPatch) -> Result<Payload> {
        self.execute(JobRequest::Update {
            job_id: job_id.into(),
            patch,
        })
        .await
    }

    pub async fn get(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Get(job_id.into())).await
    }

    pub async fn fetch_all(&self, query: ListQuery) -> Result<Payload> {
        self.execute(JobRequest::FetchAll(query)).await
    }

    pub async fn bookmark(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Bookmark(job_id.into())).await
    }

    pub async fn unbookmark(&self, job_id: impl Into<JobId>) -> Result<Payload> {
        self.execute(JobRequest::Unbookmark(job_id.into())).await
    }

    fn spawn_call(&self, request: JobRequest, handle: OperationHandle, token: CancellationToken) {
        let tracker = self.tracker.clone();
        let service = self.service.clone();
        let timeout = self.call_timeout;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(operation_id = %handle.id(), kind = %handle.kind(), "Dropped cancelled service call");
                    return;
                }
                outcome = call(service.as_ref(), &request, timeout) => outcome,
            };
            tracker.write().await.resolve(&handle, outcome);
        });
    }
}

async fn call<S>(service: &S, request: &JobRequest, timeout: Option<Duration>) -> Outcome
where
    S: JobService + ?Sized,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, dispatch(service, request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::new(format!(
                "timed out after {}ms",
                limit.as_millis()
            ))),
        },
        None => dispatch(service, request).await,
    };
    Outcome::from(result)
}
