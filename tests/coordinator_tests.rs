use std::time::Duration;

use job_lifecycle::config::{CoordinatorConfig, TrackerConfig};
use job_lifecycle::registry::OperationKind;
use job_lifecycle::service::JobRequest;
use job_lifecycle::tracker::{
    JobId, JobPatch, JobStatus, ListQuery, NewJob, OperationPhase, Payload,
};
use job_lifecycle::{ServiceError, TrackerError};

use test_harness::{coordinator_with, running_jobs, test_config, ScriptedService};

#[tokio::test]
async fn test_stop_resolves_after_delay() {
    let service = ScriptedService::with_jobs(running_jobs(42));
    service.set_delay(OperationKind::Stop, Duration::from_millis(10));
    let (coordinator, _) = coordinator_with(service, test_config()).await;
    coordinator.fetch_all(ListQuery::default()).await.unwrap();

    let pending = coordinator
        .submit(JobRequest::Stop(JobId::from("42")))
        .await
        .unwrap();
    let during = coordinator.snapshot(&JobId::from("42")).await.unwrap();
    assert!(during.pending_operations.contains(&OperationKind::Stop));

    pending.wait().await.unwrap();
    let view = coordinator.snapshot(&JobId::from("42")).await.unwrap();
    assert_ne!(view.status(), Some(JobStatus::Running));
    assert!(view.pending_operations.is_empty());
}

#[tokio::test]
async fn test_delete_blocks_restart() {
    let service = ScriptedService::with_jobs(running_jobs(42));
    service.set_delay(OperationKind::Delete, Duration::from_millis(50));
    let (coordinator, _) = coordinator_with(service.clone(), test_config()).await;

    let delete = coordinator
        .submit(JobRequest::Delete(JobId::from("42")))
        .await
        .unwrap();
    let err = coordinator.restart("42").await.unwrap_err();
    assert!(matches!(
        err,
        TrackerError::ConflictingOperation {
            blocking: OperationKind::Delete,
            ..
        }
    ));
    assert_eq!(service.calls_for(OperationKind::Restart), 0);

    assert_eq!(delete.wait().await.unwrap(), Payload::Ack);
    assert!(service.backend_job("42").is_none());
}

#[tokio::test]
async fn test_fetch_all_replaces_snapshot() {
    let service = ScriptedService::with_jobs(running_jobs(5));
    let (coordinator, _) = coordinator_with(service, test_config()).await;

    // Stale local state from an earlier session.
    {
        let tracker = coordinator.tracker();
        let mut tracker = tracker.write().await;
        let handle = tracker.begin(None, OperationKind::FetchAll).unwrap();
        tracker.resolve(
            &handle,
            job_lifecycle::tracker::Outcome::Success(Payload::Jobs(vec![
                job_lifecycle::tracker::JobRecord::new("old"),
            ])),
        );
    }

    coordinator.fetch_all(ListQuery::default()).await.unwrap();
    let ids: Vec<String> = coordinator
        .snapshot_all()
        .await
        .into_iter()
        .map(|v| v.job_id.to_string())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_double_submit_calls_service_once() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.set_delay(OperationKind::Bookmark, Duration::from_millis(30));
    let (coordinator, observer) = coordinator_with(service.clone(), test_config()).await;

    let first = coordinator
        .submit(JobRequest::Bookmark(JobId::from("1")))
        .await
        .unwrap();
    let second = coordinator
        .submit(JobRequest::Bookmark(JobId::from("1")))
        .await
        .unwrap();
    assert!(second.handle().is_coalesced());
    assert_eq!(first.handle(), second.handle());

    let (a, b) = tokio::join!(first.wait(), second.wait());
    assert_eq!(a.unwrap(), Payload::Ack);
    assert_eq!(b.unwrap(), Payload::Ack);
    assert_eq!(service.calls_for(OperationKind::Bookmark), 1);
    assert_eq!(
        observer.seen(),
        vec!["BOOKMARK_JOB_REQUEST 1", "BOOKMARK_JOB_SUCCESS 1"]
    );
}

#[tokio::test]
async fn test_transport_failure_keeps_last_known_state() {
    let service = ScriptedService::with_jobs(running_jobs(3));
    let (coordinator, observer) = coordinator_with(service.clone(), test_config()).await;
    coordinator.fetch_all(ListQuery::default()).await.unwrap();
    let before = coordinator.snapshot(&JobId::from("2")).await.unwrap();

    service.fail(
        OperationKind::Archive,
        ServiceError::new("backend unavailable").with_status(503),
    );
    let err = coordinator.archive("2").await.unwrap_err();
    assert_eq!(
        err,
        TrackerError::Transport(ServiceError::new("backend unavailable").with_status(503))
    );
    assert_eq!(coordinator.snapshot(&JobId::from("2")).await.unwrap(), before);

    let tracker = coordinator.tracker();
    let tracker = tracker.read().await;
    let failure = tracker.last_failure(Some(&JobId::from("2"))).unwrap();
    assert_eq!(failure.kind, OperationKind::Archive);
    assert!(observer.seen().contains(&"ARCHIVE_JOB_ERROR 2".to_string()));
}

#[tokio::test]
async fn test_no_automatic_retry() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.fail(OperationKind::Get, ServiceError::new("flaky"));
    let (coordinator, _) = coordinator_with(service.clone(), test_config()).await;

    assert!(coordinator.get("1").await.is_err());
    assert_eq!(service.calls_for(OperationKind::Get), 1);

    service.clear_failure(OperationKind::Get);
    assert!(matches!(coordinator.get("1").await, Ok(Payload::Job(_))));
    assert_eq!(service.calls_for(OperationKind::Get), 2);
}

#[tokio::test]
async fn test_cancel_suppresses_late_result() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.set_delay(OperationKind::Stop, Duration::from_millis(50));
    // The backend acts on the request even though we stop listening.
    service.apply_before_delay();
    let (coordinator, observer) = coordinator_with(service.clone(), test_config()).await;
    coordinator.fetch_all(ListQuery::default()).await.unwrap();

    let pending = coordinator
        .submit(JobRequest::Stop(JobId::from("1")))
        .await
        .unwrap();
    let handle = pending.handle().clone();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(coordinator.cancel(&handle).await);
    assert_eq!(pending.wait().await.unwrap_err(), TrackerError::Cancelled);
    assert!(!coordinator.cancel(&handle).await);
    assert!(!coordinator.cancel(&handle).await);

    tokio::time::sleep(Duration::from_millis(80)).await;
    // Remote state changed, local projection did not.
    assert_eq!(
        service.backend_job("1").unwrap().status,
        JobStatus::Stopped
    );
    let view = coordinator.snapshot(&JobId::from("1")).await.unwrap();
    assert_eq!(view.status(), Some(JobStatus::Running));
    assert_eq!(
        observer.seen().last().map(String::as_str),
        Some("STOP_JOB_ERROR 1")
    );
}

#[tokio::test]
async fn test_cancelled_record_is_kept_in_history() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.set_delay(OperationKind::Restart, Duration::from_millis(50));
    let (coordinator, _) = coordinator_with(service, test_config()).await;

    let pending = coordinator
        .submit(JobRequest::Restart(JobId::from("1")))
        .await
        .unwrap();
    coordinator.cancel(pending.handle()).await;

    let tracker = coordinator.tracker();
    let tracker = tracker.read().await;
    let failure = tracker.last_failure(Some(&JobId::from("1"))).unwrap();
    assert_eq!(failure.phase, OperationPhase::Failed);
    assert_eq!(failure.error, Some(TrackerError::Cancelled));
}

#[tokio::test]
async fn test_resolutions_apply_in_completion_order() {
    let service = ScriptedService::with_jobs(running_jobs(2));
    service.set_delay(OperationKind::Stop, Duration::from_millis(60));
    service.set_delay(OperationKind::Get, Duration::from_millis(5));
    let (coordinator, observer) = coordinator_with(service, test_config()).await;

    let slow = coordinator
        .submit(JobRequest::Stop(JobId::from("1")))
        .await
        .unwrap();
    let fast = coordinator
        .submit(JobRequest::Get(JobId::from("2")))
        .await
        .unwrap();
    let (slow, fast) = tokio::join!(slow.wait(), fast.wait());
    slow.unwrap();
    fast.unwrap();

    assert_eq!(
        observer.seen(),
        vec![
            "STOP_JOB_REQUEST 1",
            "GET_JOB_REQUEST 2",
            "GET_JOB_SUCCESS 2",
            "STOP_JOB_SUCCESS 1",
        ]
    );
}

#[tokio::test]
async fn test_call_timeout_settles_as_transport_error() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.set_delay(OperationKind::Get, Duration::from_millis(200));
    let config = test_config().with_call_timeout(Duration::from_millis(20));
    let (coordinator, _) = coordinator_with(service, config).await;

    match coordinator.get("1").await {
        Err(TrackerError::Transport(err)) => assert!(err.message.contains("timed out")),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(coordinator.snapshot(&JobId::from("1")).await.is_none());
}

#[tokio::test]
async fn test_shutdown_cancels_everything_in_flight() {
    let service = ScriptedService::with_jobs(running_jobs(3));
    for kind in [OperationKind::Stop, OperationKind::Bookmark, OperationKind::FetchAll] {
        service.set_delay(kind, Duration::from_millis(100));
    }
    let (coordinator, _) = coordinator_with(service, test_config()).await;

    let ops = vec![
        coordinator.submit(JobRequest::Stop(JobId::from("1"))).await.unwrap(),
        coordinator.submit(JobRequest::Bookmark(JobId::from("2"))).await.unwrap(),
        coordinator
            .submit(JobRequest::FetchAll(ListQuery::default()))
            .await
            .unwrap(),
    ];
    assert_eq!(coordinator.shutdown().await, 3);
    for op in ops {
        assert_eq!(op.wait().await.unwrap_err(), TrackerError::Cancelled);
    }
    assert_eq!(coordinator.tracker().read().await.pending_count(), 0);
}

#[tokio::test]
async fn test_create_update_and_restart_flow() {
    let service = ScriptedService::new();
    let (coordinator, _) = coordinator_with(service, test_config()).await;

    let job_id = JobId::draft();
    coordinator
        .create(
            job_id.clone(),
            NewJob {
                name: Some("train".to_string()),
                tags: vec!["gpu".to_string()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let created = coordinator.snapshot(&job_id).await.unwrap();
    assert_eq!(created.status(), Some(JobStatus::Created));

    coordinator
        .update(
            job_id.clone(),
            JobPatch {
                description: Some("resnet".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let record = coordinator.snapshot(&job_id).await.unwrap().record.unwrap();
    assert_eq!(record.name.as_deref(), Some("train"));
    assert_eq!(record.description.as_deref(), Some("resnet"));

    let restarted = match coordinator.restart(job_id.clone()).await.unwrap() {
        Payload::Job(job) => job,
        other => panic!("unexpected payload {:?}", other),
    };
    assert_eq!(restarted.status, JobStatus::Scheduled);
    assert_eq!(coordinator.snapshot_all().await.len(), 2);
}

#[tokio::test]
async fn test_bookmark_archive_restore_roundtrip() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    let (coordinator, _) = coordinator_with(service, test_config()).await;
    coordinator.fetch_all(ListQuery::default()).await.unwrap();

    coordinator.bookmark("1").await.unwrap();
    coordinator.archive("1").await.unwrap();
    let record = coordinator.snapshot(&JobId::from("1")).await.unwrap().record.unwrap();
    assert!(record.bookmarked);
    assert!(record.archived);

    coordinator.unbookmark("1").await.unwrap();
    coordinator.restore("1").await.unwrap();
    let record = coordinator.snapshot(&JobId::from("1")).await.unwrap().record.unwrap();
    assert!(!record.bookmarked);
    assert!(!record.archived);

    coordinator.delete("1").await.unwrap();
    assert!(coordinator.snapshot(&JobId::from("1")).await.is_none());
}

#[tokio::test]
async fn test_optimistic_bookmark_is_visible_before_confirmation() {
    let service = ScriptedService::with_jobs(running_jobs(1));
    service.set_delay(OperationKind::Bookmark, Duration::from_millis(30));
    service.fail(OperationKind::Bookmark, ServiceError::new("denied").with_status(403));
    let config = CoordinatorConfig::new(TrackerConfig::default().with_optimistic_defaults(true));
    let (coordinator, _) = coordinator_with(service, config).await;
    coordinator.fetch_all(ListQuery::default()).await.unwrap();

    let pending = coordinator
        .submit(JobRequest::Bookmark(JobId::from("1")))
        .await
        .unwrap();
    let during = coordinator.snapshot(&JobId::from("1")).await.unwrap();
    assert!(during.record.unwrap().bookmarked);

    assert!(pending.wait().await.is_err());
    let after = coordinator.snapshot(&JobId::from("1")).await.unwrap();
    assert!(!after.record.unwrap().bookmarked);
}
