//! Property-based Tests for the Log Filter
//!
//! The tag filter is a pure, order-preserving selection over history.

use chrono::Utc;
use proptest::prelude::*;

use procwarden::history::LogHistory;
use procwarden::models::{LogEvent, LogSource, Severity};
use procwarden::supervisor::{classify_severity, filter_events, matches, ALL_TAG};

fn events_from(messages: &[String]) -> Vec<LogEvent> {
    messages
        .iter()
        .enumerate()
        .map(|(i, message)| LogEvent {
            sequence: i as u64 + 1,
            source: LogSource::Stdout,
            severity: Severity::Info,
            message: message.clone(),
            timestamp: Utc::now(),
        })
        .collect()
}

fn source_strategy() -> impl Strategy<Value = LogSource> {
    prop_oneof![
        Just(LogSource::Stdout),
        Just(LogSource::Stderr),
        Just(LogSource::System),
    ]
}

proptest! {
    #[test]
    fn filter_matches_substring_semantics(
        messages in prop::collection::vec("(\\[API\\]|\\[BOT\\]|[a-z ]){0,12}", 0..40),
        tag in "\\[API\\]|\\[BOT\\]|[a-z]{1,3}"
    ) {
        let events = events_from(&messages);
        let filtered = filter_events(&events, &tag);

        let expected: Vec<u64> = events
            .iter()
            .filter(|e| e.message.contains(tag.as_str()))
            .map(|e| e.sequence)
            .collect();
        let got: Vec<u64> = filtered.iter().map(|e| e.sequence).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn filter_preserves_order(
        messages in prop::collection::vec("[a-c]{0,6}", 0..40),
        tag in "[a-c]{1,2}"
    ) {
        let filtered = filter_events(&events_from(&messages), &tag);
        prop_assert!(filtered.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn all_tag_returns_everything(messages in prop::collection::vec(".{0,20}", 0..30)) {
        let events = events_from(&messages);
        prop_assert_eq!(filter_events(&events, ALL_TAG), events.clone());
        prop_assert!(events.iter().all(|e| matches(e, ALL_TAG)));
    }

    #[test]
    fn history_filter_agrees_with_filter_events(
        messages in prop::collection::vec("(\\[API\\]|[a-z ]){0,8}", 0..50),
        limit in 1usize..20
    ) {
        let events = events_from(&messages);
        let history = LogHistory::with_limit(limit);
        for event in &events {
            history.push(event.clone());
        }

        let start = events.len().saturating_sub(limit);
        let retained = &events[start..];
        prop_assert_eq!(history.filtered("[API]"), filter_events(retained, "[API]"));
    }

    #[test]
    fn classification_is_total(source in source_strategy(), message in ".{0,60}") {
        let severity = classify_severity(source, &message);
        prop_assert!(matches!(severity, Severity::Info | Severity::Warning | Severity::Error));
    }

    #[test]
    fn error_token_wins_over_stream(source in source_strategy(), prefix in "[a-z ]{0,10}") {
        let message = format!("{} ERROR - failed", prefix);
        prop_assert_eq!(classify_severity(source, &message), Severity::Error);
    }
}
