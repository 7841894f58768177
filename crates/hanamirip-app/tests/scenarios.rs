mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use common::{
    CountingFinalizer, GatedFinalizer, MAGNET, PAYLOAD, PAYLOAD_NAME, harness, harness_with,
};
use hanamirip_app::JobError;
use hanamirip_events::Event;
use hanamirip_transfer_core::{JobId, JobState};
use hanamirip_transfer_rqbit::StubCall;
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn first_poll_reports_downloading_with_no_bytes() -> Result<()> {
    let h = harness()?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    assert_eq!(job.id, JobId::new(1));
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.info_hash, "0123456789abcdef");
    assert_eq!(job.name.as_deref(), Some("Show 01"));
    assert_eq!(job.working_folder, h.dir.path().join("work").join("1"));
    assert!(job.working_folder.is_dir());

    let status = h.orchestrator.get_status(job.id).await?;
    assert_eq!(status.state, JobState::Downloading);
    assert_eq!(status.progress_bytes, 0);
    assert!(!status.finalized);
    assert!(status.error.is_none());
    Ok(())
}

#[tokio::test]
async fn completion_finalizes_on_the_same_poll() -> Result<()> {
    let h = harness()?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    h.finish_download(&job).await?;

    let status = h.orchestrator.get_status(job.id).await?;
    assert_eq!(status.state, JobState::Completed);
    assert!(status.finalized);
    assert!(status.completed_at.is_some());
    assert_eq!(status.progress_bytes, status.total_bytes);
    assert_eq!(std::fs::read(h.destination().join(PAYLOAD_NAME))?, PAYLOAD);
    assert!(!job.working_folder.exists());

    let again = h.orchestrator.get_status(job.id).await?;
    assert!(again.finalized);
    assert_eq!(again.state, JobState::Completed);
    Ok(())
}

#[tokio::test]
async fn pause_and_resume_round_trip_through_the_engine() -> Result<()> {
    let h = harness()?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    let handle = h.handle(&job)?;

    h.orchestrator.pause(job.id).await?;
    h.orchestrator.pause(job.id).await?;
    assert_eq!(h.control.is_paused(handle), Some(true));
    assert_eq!(
        h.orchestrator.get_status(job.id).await?.state,
        JobState::Paused
    );

    h.orchestrator.resume(job.id).await?;
    h.orchestrator.resume(job.id).await?;
    assert_eq!(h.control.is_paused(handle), Some(false));
    assert_eq!(
        h.orchestrator.get_status(job.id).await?.state,
        JobState::Downloading
    );

    let calls = h.control.calls();
    let pauses = calls.iter().filter(|call| matches!(call, StubCall::Pause(_))).count();
    let resumes = calls.iter().filter(|call| matches!(call, StubCall::Resume(_))).count();
    assert_eq!((pauses, resumes), (1, 1), "repeat calls are absorbed by the orchestrator");
    Ok(())
}

#[tokio::test]
async fn delete_waits_for_in_flight_finalize() -> Result<()> {
    let finalizer = Arc::new(GatedFinalizer::default());
    let h = harness_with(Arc::clone(&finalizer))?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    h.finish_download(&job).await?;

    let poller = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.get_status(job.id).await })
    };
    finalizer.entered.notified().await;

    let deleter = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.delete(job.id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!deleter.is_finished(), "delete must wait for the job lock");

    finalizer.release.notify_one();
    let status = poller.await??;
    assert!(status.finalized);
    deleter.await??;

    assert!(matches!(
        h.orchestrator.get_status(job.id).await,
        Err(JobError::NotFound { .. })
    ));
    assert!(h.orchestrator.list().await.is_empty());
    assert_eq!(finalizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.control.transfer_count(), 0);
    assert!(h.destination().join(PAYLOAD_NAME).is_file());
    assert!(!job.working_folder.exists());
    Ok(())
}

#[tokio::test]
async fn failed_finalize_keeps_completed_and_can_be_retried() -> Result<()> {
    let h = harness()?;
    let destination = h.destination();
    std::fs::create_dir_all(h.dir.path().join("library"))?;
    std::fs::write(&destination, b"a file where the folder should go")?;

    let job = h.orchestrator.start(MAGNET, &destination).await?;
    h.finish_download(&job).await?;

    let status = h.orchestrator.get_status(job.id).await?;
    assert_eq!(status.state, JobState::Completed);
    assert!(!status.finalized);
    assert!(status.error.is_some());
    assert!(job.working_folder.join(PAYLOAD_NAME).is_file());

    std::fs::remove_file(&destination)?;
    let retried = h.orchestrator.retry_finalize(job.id).await?;
    assert!(retried.finalized);
    assert!(retried.error.is_none());
    assert_eq!(std::fs::read(destination.join(PAYLOAD_NAME))?, PAYLOAD);
    Ok(())
}

#[tokio::test]
async fn concurrent_polls_finalize_at_most_once() -> Result<()> {
    let finalizer = Arc::new(CountingFinalizer::default());
    let h = harness_with(Arc::clone(&finalizer))?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    h.finish_download(&job).await?;

    let mut polls = Vec::new();
    for _ in 0..16 {
        let orchestrator = Arc::clone(&h.orchestrator);
        polls.push(tokio::spawn(async move { orchestrator.get_status(job.id).await }));
    }
    for poll in polls {
        assert!(poll.await??.finalized);
    }
    assert_eq!(finalizer.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_starts_get_unique_increasing_ids() -> Result<()> {
    let h = harness()?;
    let mut starts = Vec::new();
    for n in 0..24 {
        let orchestrator = Arc::clone(&h.orchestrator);
        let destination = h.dir.path().join(format!("out-{n}"));
        starts.push(tokio::spawn(async move {
            orchestrator.start(MAGNET, &destination).await
        }));
    }
    let mut ids = HashSet::new();
    for start in starts {
        assert!(ids.insert(start.await??.id));
    }
    let listed: Vec<u64> = h.orchestrator.list().await.iter().map(|job| job.id.get()).collect();
    assert_eq!(listed, (1..=24).collect::<Vec<_>>());

    let next = h.orchestrator.start(MAGNET, &h.destination()).await?;
    assert_eq!(next.id, JobId::new(25));
    Ok(())
}

#[tokio::test]
async fn rejected_admission_registers_nothing() -> Result<()> {
    let h = harness()?;
    h.control.reject_next_add("metadata unavailable");
    let err = h
        .orchestrator
        .start(MAGNET, &h.destination())
        .await
        .expect_err("engine refuses");
    assert!(matches!(err, JobError::Engine { .. }));
    assert!(err.detail().contains("metadata unavailable"));
    assert!(h.orchestrator.list().await.is_empty());
    assert!(!h.dir.path().join("work").join("1").exists());

    let err = h
        .orchestrator
        .start("ftp://example.org/show.torrent", &h.destination())
        .await
        .expect_err("unsupported scheme");
    assert!(matches!(err, JobError::InvalidSource { .. }));

    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    assert_eq!(job.id, JobId::new(2), "ids are never reused");
    Ok(())
}

#[tokio::test]
async fn unusable_work_root_is_an_io_error() -> Result<()> {
    let h = harness()?;
    let work_root = h.dir.path().join("work");
    std::fs::write(&work_root, b"a file where the work root should be")?;

    let err = h
        .orchestrator
        .start(MAGNET, &h.destination())
        .await
        .expect_err("working folder cannot be created");
    assert_eq!(err.kind(), "io_error");
    assert!(matches!(err, JobError::Io { .. }));
    assert!(err.detail().contains("create_working_folder"));
    assert!(h.orchestrator.list().await.is_empty());
    assert_eq!(h.control.transfer_count(), 0);
    assert!(work_root.is_file());

    std::fs::remove_file(&work_root)?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    assert_eq!(job.id, JobId::new(2));
    Ok(())
}

#[tokio::test]
async fn engine_failure_flips_job_to_failed() -> Result<()> {
    let h = harness()?;
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    let handle = h.handle(&job)?;
    h.control.set_progress(handle, 40, 100);
    h.engine.refresh().await?;
    assert_eq!(h.orchestrator.get_status(job.id).await?.progress_bytes, 40);

    h.control.fail(handle, "tracker returned an error");
    h.engine.refresh().await?;
    let status = h.orchestrator.get_status(job.id).await?;
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("tracker returned an error"));
    assert_eq!(status.progress_bytes, 40);

    assert!(matches!(
        h.orchestrator.pause(job.id).await,
        Err(JobError::InvalidState { .. })
    ));
    h.orchestrator.delete(job.id).await?;
    Ok(())
}

#[tokio::test]
async fn unknown_ids() -> Result<()> {
    let h = harness()?;
    let missing = JobId::new(42);
    assert!(matches!(
        h.orchestrator.get_status(missing).await,
        Err(JobError::NotFound { .. })
    ));
    assert!(matches!(
        h.orchestrator.pause(missing).await,
        Err(JobError::NotFound { .. })
    ));
    assert!(matches!(
        h.orchestrator.resume(missing).await,
        Err(JobError::NotFound { .. })
    ));
    h.orchestrator.delete(missing).await?;
    Ok(())
}

#[tokio::test]
async fn lifecycle_events_are_published_in_order() -> Result<()> {
    let h = harness()?;
    let mut events = h.orchestrator.subscribe(None);
    let job = h.orchestrator.start(MAGNET, &h.destination()).await?;
    h.finish_download(&job).await?;
    h.orchestrator.get_status(job.id).await?;
    h.orchestrator.delete(job.id).await?;

    let mut kinds = Vec::new();
    while let Ok(Some(envelope)) = timeout(Duration::from_millis(100), events.next()).await {
        assert_eq!(envelope.event.job_id(), job.id);
        kinds.push(envelope.event.kind());
        if matches!(envelope.event, Event::JobRemoved { .. }) {
            break;
        }
    }
    assert_eq!(
        kinds,
        vec![
            "job_added",
            "state_changed",
            "progress",
            "finalize_started",
            "finalize_completed",
            "job_removed"
        ]
    );
    Ok(())
}
