//! Integration tests for environment configuration and the polled match board.

use chrono::{Duration, TimeZone, Utc};
use prompt_wars_console::client::ApiError;
use prompt_wars_console::config::{MAX_INACTIVITY_HOURS, MIN_SESSION_SECRET_LEN};
use prompt_wars_console::sync::MatchBoard;
use prompt_wars_console::{Config, Match, MatchPhase, Stage, Team};
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_when_nothing_is_set() {
    let c = Config::from_lookup(lookup(&[]));
    assert_eq!(c.host, "0.0.0.0");
    assert_eq!(c.port, 8080);
    assert_eq!(c.backend_url, "http://localhost:8000");
    assert_eq!(c.poll_interval, std::time::Duration::from_secs(3));
    assert_eq!(c.inactivity_timeout, std::time::Duration::from_secs(12 * 3600));
    assert_eq!(c.static_dir, "static");
    assert_eq!(c.session_secret.len(), MIN_SESSION_SECRET_LEN);
}

#[test]
fn values_are_read_and_validated() {
    let secret = "s".repeat(80);
    let c = Config::from_lookup(lookup(&[
        ("HOST", "127.0.0.1"),
        ("PORT", "9000"),
        ("BACKEND_URL", "https://api.example.org/"),
        ("SESSION_SECRET", &secret),
        ("POLL_INTERVAL_SECS", "5"),
        ("INACTIVITY_HOURS", "2"),
    ]));
    assert_eq!(c.bind_addr(), ("127.0.0.1".to_string(), 9000));
    assert_eq!(c.backend_url, "https://api.example.org");
    assert_eq!(c.session_secret, secret.into_bytes());
    assert_eq!(c.poll_interval.as_secs(), 5);
    assert_eq!(c.inactivity_timeout.as_secs(), 7200);
}

#[test]
fn invalid_values_fall_back() {
    let c = Config::from_lookup(lookup(&[
        ("PORT", "eighty"),
        ("BACKEND_URL", "localhost:8000"),
        ("SESSION_SECRET", "short"),
        ("POLL_INTERVAL_SECS", "0"),
    ]));
    assert_eq!(c.port, 8080);
    assert_eq!(c.backend_url, "http://localhost:8000");
    assert_ne!(c.session_secret, b"short".to_vec());
    assert_eq!(c.session_secret.len(), MIN_SESSION_SECRET_LEN);
    assert_eq!(c.poll_interval.as_secs(), 3);
}

#[test]
fn huge_inactivity_window_falls_back() {
    let c = Config::from_lookup(lookup(&[("INACTIVITY_HOURS", "18446744073709551615")]));
    assert_eq!(c.inactivity_timeout.as_secs(), 12 * 3600);

    let max = MAX_INACTIVITY_HOURS.to_string();
    let c = Config::from_lookup(lookup(&[("INACTIVITY_HOURS", &max)]));
    assert_eq!(c.inactivity_timeout.as_secs(), MAX_INACTIVITY_HOURS * 3600);
}

fn m(id: u64) -> Match {
    Match::new(id, Some(Team::new(1, "Red")), Some(Team::new(2, "Blue")), Stage::Quarterfinal)
}

#[test]
fn board_is_last_write_wins() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut board = MatchBoard::new();
    assert!(board.is_stale(now, Duration::seconds(3)));

    assert!(board.apply(Ok(vec![m(2), m(1)]), now));
    assert_eq!(board.matches.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(!board.is_stale(now + Duration::seconds(2), Duration::seconds(3)));
    assert!(board.is_stale(now + Duration::seconds(4), Duration::seconds(3)));

    // Same data again is not a change
    assert!(!board.apply(Ok(vec![m(1), m(2)]), now));
    assert!(board.apply(Ok(vec![m(3)]), now));
    assert_eq!(board.matches.len(), 1);
}

#[test]
fn failed_poll_keeps_previous_snapshot() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut board = MatchBoard::new();
    board.apply(Ok(vec![m(1)]), now);
    let later = now + Duration::seconds(3);
    assert!(!board.apply(Err(ApiError::Request("connection refused".to_string())), later));
    assert_eq!(board.matches.len(), 1);
    assert_eq!(board.fetched_at, Some(now));
    assert_eq!(board.last_error.as_deref(), Some("connection refused"));

    board.apply(Ok(vec![m(1)]), later);
    assert!(board.last_error.is_none());
}

#[test]
fn upsert_replaces_or_inserts_in_order() {
    let mut board = MatchBoard::new();
    board.upsert(m(3));
    board.upsert(m(1));
    let mut changed = m(3);
    changed.current_round = 2;
    board.upsert(changed);
    assert_eq!(board.matches.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(board.find(3).map(|m| m.current_round), Some(2));
    assert!(board.find(9).is_none());
}

#[test]
fn polls_keep_the_known_phase_start() {
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut board = MatchBoard::new();
    let mut live = m(1);
    live.current_phase = MatchPhase::AttackerChat;
    live.phase_start_time = Some(now);
    board.upsert(live.clone());

    // The list payload carries no start time
    let mut polled = live.clone();
    polled.phase_start_time = None;
    assert!(!board.apply(Ok(vec![polled.clone()]), now + Duration::seconds(3)));
    assert_eq!(board.find(1).and_then(|m| m.phase_start_time), Some(now));

    // Once the phase moves on, the old start no longer applies
    polled.current_phase = MatchPhase::RoundComplete;
    assert!(board.apply(Ok(vec![polled]), now + Duration::seconds(6)));
    assert_eq!(board.find(1).and_then(|m| m.phase_start_time), None);
}
