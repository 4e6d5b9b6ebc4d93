//! Integration tests for wall-clock countdowns.

use chrono::{Duration, TimeZone, Utc};
use prompt_wars_console::logic::countdown::{format_clock, Countdown, ATTACKER_CHAT_SECS};

#[test]
fn reload_reconstructs_remaining_time() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let c = Countdown::new(start, ATTACKER_CHAT_SECS);
    // A page opened 2 minutes into the phase sees 3 minutes left
    assert_eq!(c.remaining_secs(start + Duration::seconds(120)), 180);
    assert_eq!(c.elapsed_secs(start + Duration::seconds(120)), 120);
    assert!(!c.is_expired(start + Duration::seconds(120)));
}

#[test]
fn remaining_is_clamped() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let c = Countdown::new(start, 180);
    assert_eq!(c.remaining_secs(start + Duration::seconds(400)), 0);
    assert!(c.is_expired(start + Duration::seconds(400)));
    // Clock skew: a start time in the future shows the full window
    assert_eq!(c.remaining_secs(start - Duration::seconds(5)), 180);
}

#[test]
fn expiry_and_low_time_boundaries() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let c = Countdown::new(start, 180);
    assert!(!c.is_expired(start + Duration::milliseconds(179_999)));
    assert!(c.is_expired(start + Duration::seconds(180)));
    assert!(!c.is_low_time(start + Duration::seconds(119)));
    assert!(c.is_low_time(start + Duration::seconds(120)));
    assert_eq!(c.percent_remaining(start + Duration::seconds(90)), 50);
}

#[test]
fn snapshot_for_the_page() {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let snap = Countdown::new(start, 300).snapshot(start + Duration::seconds(255));
    assert_eq!(snap.remaining_secs, 45);
    assert_eq!(snap.display, "00:45");
    assert!(snap.low_time);
    assert!(!snap.expired);
}

#[test]
fn clock_format() {
    assert_eq!(format_clock(Some(0)), "00:00");
    assert_eq!(format_clock(Some(90)), "01:30");
    assert_eq!(format_clock(Some(300)), "05:00");
    assert_eq!(format_clock(None), "Failed");
}
