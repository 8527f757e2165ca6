//! Integration Tests for the Interactive Prompt Flow
//!
//! A server prints a line, then a "Press ENTER to continue" prompt, then
//! blocks reading stdin. These tests drive that exchange end to end through
//! the supervisor: the awaiting flag rises, one continue is relayed and
//! echoed, and the server runs on to completion.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use procwarden::models::{LogSource, Severity};
use procwarden::supervisor::Supervisor;
use procwarden::Error;
use test_utils::{collect_until, messages_from, quick_config, sh};

const PROMPT_SCRIPT: &str = r#"echo hello; echo "Press ENTER to continue"; read x; echo done"#;

#[tokio::test]
async fn test_prompt_raises_flag_and_continue_resumes() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor.start(sh(PROMPT_SCRIPT)).await.unwrap();

    let before = collect_until(&mut sub, |e| e.message.contains("Press ENTER")).await;
    let stdout = messages_from(&before, LogSource::Stdout);
    assert_eq!(stdout, vec!["hello", "Press ENTER to continue"]);

    // The flag is raised before the prompt line reaches any observer
    let status = supervisor.status();
    assert!(status.running);
    assert!(status.awaiting_input);

    supervisor.send_continue().await.unwrap();
    assert!(!supervisor.status().awaiting_input);

    let after = collect_until(&mut sub, |e| e.message == "done").await;
    assert!(after.iter().any(|e| e.message == "> (ENTER)"));

    let summary = supervisor.wait_for_exit().await.unwrap();
    assert!(summary.is_success());
    assert!(!summary.requested);
    assert!(!supervisor.status().running);
}

#[tokio::test]
async fn test_prompt_is_followed_by_awaiting_notice() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor.start(sh(PROMPT_SCRIPT)).await.unwrap();

    collect_until(&mut sub, |e| e.message.contains("Press ENTER")).await;
    let notice = collect_until(&mut sub, |e| e.source == LogSource::System).await;
    let notice = notice.last().unwrap();
    assert_eq!(notice.severity, Severity::Warning);
    assert!(!notice.message.contains("Press ENTER"));

    supervisor.send_continue().await.unwrap();
    supervisor.wait_for_exit().await.unwrap();
}

#[tokio::test]
async fn test_continue_before_prompt_is_rejected() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor
        .start(sh(r#"echo hello; sleep 1; echo "Press ENTER to continue"; read x"#))
        .await
        .unwrap();

    collect_until(&mut sub, |e| e.message == "hello").await;
    let err = supervisor.send_continue().await.unwrap_err();
    assert!(matches!(err, Error::NotAwaitingInput));
    assert!(supervisor.status().running);

    collect_until(&mut sub, |e| e.message.contains("Press ENTER")).await;
    supervisor.send_continue().await.unwrap();

    // A second continue without a new prompt is rejected again
    let err = supervisor.send_continue().await.unwrap_err();
    assert!(err.is_not_awaiting_input());

    supervisor.wait_for_exit().await.unwrap();
}

#[tokio::test]
async fn test_continue_when_idle_is_rejected() {
    let supervisor = Supervisor::new(quick_config());
    let err = supervisor.send_continue().await.unwrap_err();
    assert!(err.is_not_awaiting_input());
}

#[tokio::test]
async fn test_stop_while_awaiting_clears_flag() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor.start(sh(PROMPT_SCRIPT)).await.unwrap();

    collect_until(&mut sub, |e| e.message.contains("Press ENTER")).await;
    assert!(supervisor.status().awaiting_input);

    supervisor.stop().await.unwrap();
    let status = supervisor.status();
    assert!(!status.running);
    assert!(!status.awaiting_input);
    assert!(supervisor.send_continue().await.is_err());
}

#[tokio::test]
async fn test_prompt_on_stderr_is_detected() {
    let supervisor = Supervisor::new(quick_config());
    let mut sub = supervisor.subscribe();
    supervisor
        .start(sh(r#"echo "press ENTER when ready" >&2; read x; echo resumed"#))
        .await
        .unwrap();

    collect_until(&mut sub, |e| e.source == LogSource::Stderr).await;
    assert!(supervisor.status().awaiting_input);

    supervisor.send_continue().await.unwrap();
    collect_until(&mut sub, |e| e.message == "resumed").await;
    supervisor.wait_for_exit().await.unwrap();
}
