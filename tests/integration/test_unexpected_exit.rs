//! Integration Tests for Unexpected Server Exit
//!
//! When the server dies on its own, the supervisor must notice it, drain
//! the remaining output, publish an exit summary and go back to idle so a
//! new start is accepted.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::time::Duration;

use procwarden::models::{LogSource, Severity};
use procwarden::supervisor::Supervisor;
use test_utils::{captured, collect_until, quick_config, sh, WAIT_LIMIT};

#[tokio::test]
async fn test_nonzero_exit_publishes_error_summary() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor
        .start(sh("echo starting; echo boom >&2; exit 3"))
        .await
        .unwrap();

    let summary = tokio::time::timeout(WAIT_LIMIT, supervisor.wait_for_exit())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.code, Some(3));
    assert!(!summary.requested);

    let status = supervisor.status();
    assert!(!status.running);
    assert!(!status.awaiting_input);

    let events = sub.drain();
    let lines = captured(&events);
    assert!(lines
        .iter()
        .any(|e| e.source == LogSource::Stderr && e.message == "boom" && e.severity == Severity::Error));

    // Output is drained before the summary is published
    let last = events.last().unwrap();
    assert_eq!(last.source, LogSource::System);
    assert_eq!(last.severity, Severity::Error);
    assert!(last.message.contains("code 3"));
}

#[tokio::test]
async fn test_clean_exit_publishes_info_summary() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor.start(sh("echo finished")).await.unwrap();

    let summary = supervisor.wait_for_exit().await.unwrap();
    assert!(summary.is_success());

    let events = collect_until(&mut sub, |e| {
        e.source == LogSource::System && e.message.contains("exited")
    })
    .await;
    let last = events.last().unwrap();
    assert_eq!(last.severity, Severity::Info);
    assert!(events.iter().any(|e| e.message == "finished"));
}

#[tokio::test]
async fn test_killed_externally_reports_signal() {
    let supervisor = Supervisor::new(quick_config());
    let handle = supervisor.start(sh("sleep 30")).await.unwrap();

    // Kill behind the supervisor's back
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(handle.pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    )
    .unwrap();

    let summary = tokio::time::timeout(WAIT_LIMIT, supervisor.wait_for_exit())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.code, None);
    assert_eq!(summary.signal, Some(9));
    assert!(!summary.requested);
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn test_start_accepted_after_unexpected_exit() {
    let supervisor = Supervisor::new(quick_config());
    let first = supervisor.start(sh("exit 1")).await.unwrap();
    supervisor.wait_for_exit().await.unwrap();

    let second = supervisor.start(sh("sleep 30")).await.unwrap();
    assert_ne!(first.id, second.id);
    assert!(supervisor.status().running);

    supervisor.stop().await.unwrap();
    assert!(!supervisor.status().running);
}

#[tokio::test]
async fn test_exit_with_open_stdout_descendant_still_finishes() {
    let supervisor = Supervisor::new(quick_config());
    // The background sleep inherits stdout and keeps the pipe open
    supervisor
        .start(sh("sleep 30 & echo parent done; exit 0"))
        .await
        .unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for_exit())
        .await
        .expect("monitor must not wait for the orphaned pipe")
        .unwrap();
    assert!(summary.is_success());
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn test_stop_after_unexpected_exit_is_noop() {
    let supervisor = Supervisor::new(quick_config());
    supervisor.start(sh("exit 0")).await.unwrap();
    supervisor.wait_for_exit().await.unwrap();

    let mut sub = supervisor.subscribe();
    supervisor.stop().await.unwrap();
    assert!(sub.try_recv().is_none());
}
