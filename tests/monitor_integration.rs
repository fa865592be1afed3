//! Job monitoring against a scripted server.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{job, Harness, Reply};
use scanwarden::api::models::{JobStatus, StartAnalysisResult};
use scanwarden::error::{Error, JobPhase};
use scanwarden::monitor::{JobMonitor, PollSettings, Poller};
use scanwarden::sink::Level;

fn script_statuses(h: &Harness, job_id: &str, statuses: &[&str]) {
    let route = format!("GET /api/jobs/{}", job_id);
    for status in statuses {
        h.backend.on_json(&route, 200, job(job_id, status));
    }
}

#[tokio::test(start_paused = true)]
async fn test_direct_monitor_reports_changes_only() {
    let h = Harness::no_retries();
    script_statuses(&h, "j1", &["queued", "queued", "running", "running", "completed"]);

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let mut monitor = JobMonitor::for_submission(StartAnalysisResult {
        analysis_id: 21,
        job_id: "j1".into(),
    });

    assert_eq!(monitor.wait_for_start(&poller).await.unwrap(), 21);
    let status = monitor.wait_for_finish(&poller).await.unwrap();

    assert_eq!(status, JobStatus::Completed);
    assert_eq!(h.backend.count("GET /api/jobs/j1"), 5);
    assert_eq!(
        h.sink.messages(Level::Info),
        vec!["Analysis job j1 is queued", "Analysis job j1 is running"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_direct_monitor_returns_failed_status() {
    let h = Harness::no_retries();
    script_statuses(&h, "j2", &["running", "failed"]);

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let mut monitor = JobMonitor::for_submission(StartAnalysisResult {
        analysis_id: 3,
        job_id: "j2".into(),
    });

    assert_eq!(monitor.wait_for_finish(&poller).await.unwrap(), JobStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_chained_monitor_failed_fetch_skips_result() {
    let h = Harness::no_retries();
    script_statuses(&h, "fetch-1", &["queued", "failed"]);

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let mut monitor = JobMonitor::for_submission(StartAnalysisResult {
        analysis_id: -1,
        job_id: "fetch-1".into(),
    });

    let err = monitor.wait_for_start(&poller).await.unwrap_err();

    match err {
        Error::JobFailed { job_id, phase } => {
            assert_eq!(job_id, "fetch-1");
            assert_eq!(phase, JobPhase::SourceFetch);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.backend.count("GET /api/jobs/fetch-1/result"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_chained_monitor_follows_into_analysis() {
    let h = Harness::no_retries();
    script_statuses(&h, "fetch-2", &["running", "completed"]);
    h.backend.on_json(
        "GET /api/jobs/fetch-2/result",
        200,
        json!({"analysisId": 9, "jobId": "a-9"}),
    );
    script_statuses(&h, "a-9", &["queued", "completed"]);

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let mut monitor = JobMonitor::for_submission(StartAnalysisResult {
        analysis_id: -1,
        job_id: "fetch-2".into(),
    });

    assert_eq!(monitor.wait_for_start(&poller).await.unwrap(), 9);
    assert_eq!(monitor.analysis_job_id(), Some("a-9"));
    assert_eq!(monitor.wait_for_finish(&poller).await.unwrap(), JobStatus::Completed);

    // The fetch job is not polled again once the analysis is known
    assert_eq!(h.backend.count("GET /api/jobs/fetch-2"), 2);
    assert_eq!(h.backend.count("GET /api/jobs/fetch-2/result"), 1);
    assert_eq!(
        h.sink.messages(Level::Info),
        vec![
            "Source fetch job fetch-2 is running",
            "Source fetch finished; analysis 9 running as job a-9",
            "Analysis job a-9 is queued",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_chained_monitor_rejects_pending_result() {
    let h = Harness::no_retries();
    script_statuses(&h, "fetch-3", &["completed"]);
    h.backend.on_json(
        "GET /api/jobs/fetch-3/result",
        200,
        json!({"analysisId": -1, "jobId": "fetch-3"}),
    );

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let mut monitor = JobMonitor::for_submission(StartAnalysisResult {
        analysis_id: -1,
        job_id: "fetch-3".into(),
    });

    let err = monitor.wait_for_start(&poller).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout() {
    let h = Harness::no_retries();
    script_statuses(&h, "slow", &["running"]);

    let settings = PollSettings {
        interval: Duration::from_secs(3),
        timeout: Some(Duration::from_secs(10)),
    };
    let poller = Poller::new(&h.api, &settings);

    let err = poller
        .until_terminal("slow", JobPhase::Analysis)
        .await
        .unwrap_err();

    match err {
        Error::Timeout { job_id, waited, .. } => {
            assert_eq!(job_id, "slow");
            assert!(waited >= Duration::from_secs(10));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling() {
    let h = Harness::no_retries();
    script_statuses(&h, "forever", &["queued"]);

    let cancel = h.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        cancel.cancel();
    });

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let err = poller
        .until_terminal("forever", JobPhase::Analysis)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Interrupted(_)));
    // Polls at 0s, 3s and 6s
    assert_eq!(h.backend.count("GET /api/jobs/forever"), 3);
}

#[tokio::test]
async fn test_polling_failure_after_retries() {
    let h = Harness::fast_retries();
    h.backend
        .on("GET /api/jobs/broken", Reply::Text(502, "bad gateway".into()));

    let settings = PollSettings::default();
    let poller = Poller::new(&h.api, &settings);
    let err = poller
        .until_terminal("broken", JobPhase::SourceFetch)
        .await
        .unwrap_err();

    match &err {
        Error::Polling { job_id, phase, source } => {
            assert_eq!(job_id, "broken");
            assert_eq!(*phase, JobPhase::SourceFetch);
            assert_eq!(source.status(), Some(502));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.backend.count("GET /api/jobs/broken"), 3);
}
