//! Phase countdowns anchored to the phase start time.
//!
//! Remaining time is always recomputed from the stored start timestamp, so a
//! reloaded page (or a restarted console) shows the same clock as everyone else.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Defender setup window.
pub const DEFENDER_SETUP_SECS: u32 = 180;
/// Attacker chat window.
pub const ATTACKER_CHAT_SECS: u32 = 300;
/// Below this many seconds the clock is shown as running low.
pub const LOW_TIME_SECS: u32 = 60;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Countdown {
    pub started_at: DateTime<Utc>,
    pub duration_secs: u32,
}

impl Countdown {
    pub fn new(started_at: DateTime<Utc>, duration_secs: u32) -> Self {
        Self {
            started_at,
            duration_secs,
        }
    }

    /// Whole seconds since the start, clamped to `[0, duration]`.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.started_at).num_seconds();
        elapsed.clamp(0, i64::from(self.duration_secs)) as u32
    }

    /// `duration - (now - started_at)`, clamped at 0 (and at `duration` for clock skew).
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        self.duration_secs - self.elapsed_secs(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.started_at >= Duration::seconds(i64::from(self.duration_secs))
    }

    pub fn is_low_time(&self, now: DateTime<Utc>) -> bool {
        self.remaining_secs(now) <= LOW_TIME_SECS
    }

    /// Remaining share of the window, 0..=100 (progress bar).
    pub fn percent_remaining(&self, now: DateTime<Utc>) -> u32 {
        if self.duration_secs == 0 {
            return 0;
        }
        self.remaining_secs(now) * 100 / self.duration_secs
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CountdownSnapshot {
        let remaining = self.remaining_secs(now);
        CountdownSnapshot {
            started_at: self.started_at,
            duration_secs: self.duration_secs,
            remaining_secs: remaining,
            display: format_clock(Some(remaining)),
            low_time: remaining <= LOW_TIME_SECS,
            expired: self.is_expired(now),
        }
    }
}

/// Countdown state as sent to the console page.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CountdownSnapshot {
    pub started_at: DateTime<Utc>,
    pub duration_secs: u32,
    pub remaining_secs: u32,
    pub display: String,
    pub low_time: bool,
    pub expired: bool,
}

/// `MM:SS`, or `Failed` when there is no time (key never found).
pub fn format_clock(seconds: Option<u32>) -> String {
    match seconds {
        Some(s) => format!("{:02}:{:02}", s / 60, s % 60),
        None => "Failed".to_string(),
    }
}
