//! Contract Tests for the Process Supervisor
//!
//! These tests pin down the lifecycle contract: at most one child, stop is
//! idempotent, failed starts leave no trace, and every session begins with
//! a "started" notice at sequence 1 and ends with "stopped" when stopped.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use procwarden::models::{LogSource, ProcessState, ServerStatus, Severity};
use procwarden::supervisor::{LaunchSpec, LogObserver, Supervisor, SupervisorConfig};
use procwarden::{Error, LogHistory};
use test_utils::{collect_to_close, collect_until, quick_config, sh};

#[tokio::test]
async fn test_start_stop_start() {
    let supervisor = Supervisor::new(quick_config());

    let first = supervisor.start(sh("sleep 30")).await.unwrap();
    assert_eq!(first.state, ProcessState::Running);
    assert!(supervisor.is_running());

    supervisor.stop().await.unwrap();
    assert_eq!(supervisor.status(), ServerStatus::default());

    let second = supervisor.start(sh("sleep 30")).await.unwrap();
    assert_ne!(first.pid, second.pid);
    assert!(supervisor.is_running());

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_start_reports_running_pid() {
    let supervisor = Supervisor::new(quick_config());
    let handle = supervisor.start(sh("sleep 30")).await.unwrap();

    let err = supervisor.start(sh("echo never")).await.unwrap_err();
    assert!(err.is_already_running());
    assert!(matches!(err, Error::AlreadyRunning { pid } if pid == handle.pid));
    assert_eq!(supervisor.handle().unwrap().pid, handle.pid);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_starts_admit_one() {
    let supervisor = Supervisor::new(quick_config());

    let (a, b) = tokio::join!(
        supervisor.start(sh("sleep 30")),
        supervisor.start(sh("sleep 30"))
    );
    let (winner, loser) = match (a, b) {
        (Ok(handle), Err(e)) | (Err(e), Ok(handle)) => (handle, e),
        (a, b) => panic!("expected exactly one start to succeed: {:?} / {:?}", a.is_ok(), b.is_ok()),
    };
    assert!(matches!(loser, Error::AlreadyRunning { pid } if pid == winner.pid));
    assert_eq!(supervisor.handle().unwrap().pid, winner.pid);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let supervisor = Supervisor::new(quick_config());
    supervisor.stop().await.unwrap();

    supervisor.start(sh("sleep 30")).await.unwrap();
    supervisor.stop().await.unwrap();
    supervisor.stop().await.unwrap();
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn test_session_notices_and_sequence() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    let handle = supervisor.start(sh("echo ready; sleep 30")).await.unwrap();

    let events = collect_until(&mut sub, |e| e.message == "ready").await;
    let started = &events[0];
    assert_eq!(started.sequence, 1);
    assert_eq!(started.source, LogSource::System);
    assert_eq!(started.severity, Severity::Info);
    assert!(started.message.contains(&format!("pid {}", handle.pid)));

    supervisor.stop().await.unwrap();

    // Stop publishes its notice, then detaches every observer
    let rest = collect_to_close(&mut sub).await;
    let stopped = rest.last().unwrap();
    assert_eq!(stopped.source, LogSource::System);
    assert_eq!(stopped.message, "Server stopped");
    assert_eq!(supervisor.sink().observer_count(), 0);

    // No exit summary for a requested stop
    assert!(!rest.iter().any(|e| e.message.contains("exited with code")));
}

#[tokio::test]
async fn test_new_session_starts_at_sequence_one() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor.start(sh("echo a; echo b; sleep 30")).await.unwrap();
    collect_until(&mut sub, |e| e.message == "b").await;
    supervisor.stop().await.unwrap();

    let mut sub = supervisor.subscribe();
    supervisor.start(sh("echo c; sleep 30")).await.unwrap();
    let events = collect_until(&mut sub, |e| e.message == "c").await;
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, 2);

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_spawn_failure_leaves_supervisor_idle() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();

    let err = supervisor
        .start(LaunchSpec::new("/definitely/not/a/server"))
        .await
        .unwrap_err();
    assert!(err.is_spawn_failure());
    assert!(err.to_string().contains("/definitely/not/a/server"));
    assert_eq!(supervisor.status(), ServerStatus::default());
    assert!(supervisor.handle().is_none());
    assert!(sub.try_recv().is_none());

    supervisor.start(sh("sleep 30")).await.unwrap();
    assert!(supervisor.is_running());
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_command_is_rejected() {
    let supervisor = Supervisor::new(quick_config());
    let err = supervisor.start(LaunchSpec::new("")).await.unwrap_err();
    assert!(err.is_spawn_failure());
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn test_stop_escalates_when_term_is_ignored() {
    let supervisor = Supervisor::new(SupervisorConfig {
        grace_period: Duration::from_millis(300),
        ..quick_config()
    });
    let mut sub = supervisor.subscribe();
    supervisor
        .start(sh("trap '' TERM; echo ready; while true; do sleep 1; done"))
        .await
        .unwrap();
    collect_until(&mut sub, |e| e.message == "ready").await;

    let started = std::time::Instant::now();
    supervisor.stop().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(!supervisor.is_running());

    let summary = supervisor.wait_for_exit().await.unwrap();
    assert!(summary.requested);
}

#[tokio::test]
async fn test_restart_replaces_child() {
    let supervisor = Supervisor::new(quick_config());
    let first = supervisor.start(sh("sleep 30")).await.unwrap();
    let second = supervisor.restart(sh("sleep 30")).await.unwrap();

    assert_ne!(first.pid, second.pid);
    assert_eq!(supervisor.handle().unwrap().pid, second.pid);
    assert!(supervisor.is_running());

    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_when_idle_starts() {
    let supervisor = Supervisor::new(quick_config());
    supervisor.restart(sh("sleep 30")).await.unwrap();
    assert!(supervisor.is_running());
    supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_session_observer_sees_whole_session() {
    let supervisor = Supervisor::new(quick_config());
    let history = Arc::new(LogHistory::with_limit(100));
    let observer: Arc<dyn LogObserver> = history.clone();

    supervisor
        .start_observed(sh("echo one; echo two"), vec![observer])
        .await
        .unwrap();
    supervisor.wait_for_exit().await.unwrap();

    let events = history.snapshot();
    assert_eq!(events[0].sequence, 1);
    assert!(events.iter().any(|e| e.message == "one"));
    assert!(events.iter().any(|e| e.message == "two"));
    assert_eq!(supervisor.sink().observer_count(), 0);
}

#[tokio::test]
async fn test_environment_and_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor
        .start(
            sh(r#"echo "$BOT_MODE"; pwd"#)
                .env("BOT_MODE", "paper")
                .working_dir(dir.path()),
        )
        .await
        .unwrap();
    supervisor.wait_for_exit().await.unwrap();

    let lines: Vec<String> = sub
        .drain()
        .into_iter()
        .filter(|e| e.source == LogSource::Stdout)
        .map(|e| e.message)
        .collect();
    assert_eq!(lines[0], "paper");
    let reported = std::fs::canonicalize(&lines[1]).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
}
