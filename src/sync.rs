//! Poll-synchronized snapshot of a tournament's matches.
//!
//! The backend is the source of truth. Each poll replaces the snapshot wholesale
//! (last write wins); a failed poll keeps the previous data and records the error.
//!
//! Match payloads may omit `phase_start_time`; only a phase update returns it. The
//! board keeps the last known start for as long as the match stays in the same phase
//! and round, so countdowns and extraction times survive a re-fetch.

use crate::client::ApiError;
use crate::models::{Match, MatchId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize)]
pub struct MatchBoard {
    pub matches: Vec<Match>,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed poll, cleared by the next success.
    pub last_error: Option<String>,
}

impl MatchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the outcome of a `list_matches` poll. Returns true when the snapshot changed.
    pub fn apply(&mut self, result: Result<Vec<Match>, ApiError>, now: DateTime<Utc>) -> bool {
        match result {
            Ok(mut matches) => {
                matches.sort_by_key(|m| m.id);
                for m in matches.iter_mut() {
                    self.restore_phase_start(m);
                }
                let changed = matches != self.matches;
                self.matches = matches;
                self.fetched_at = Some(now);
                self.last_error = None;
                changed
            }
            Err(e) => {
                log::warn!("match poll failed, keeping previous snapshot: {e}");
                self.last_error = Some(e.message().to_string());
                false
            }
        }
    }

    /// Replace (or add) one match, e.g. after a `get_match` or a local phase change.
    pub fn upsert(&mut self, m: Match) {
        match self.matches.binary_search_by_key(&m.id, |existing| existing.id) {
            Ok(i) => self.matches[i] = m,
            Err(i) => self.matches.insert(i, m),
        }
    }

    /// Fill a missing `phase_start_time` from the snapshot's copy of the same match,
    /// provided it is still in the same phase and round. Returns true when filled.
    pub fn restore_phase_start(&self, m: &mut Match) -> bool {
        if m.phase_start_time.is_some() {
            return false;
        }
        let known = self
            .find(m.id)
            .filter(|cached| cached.current_phase == m.current_phase && cached.current_round == m.current_round)
            .and_then(|cached| cached.phase_start_time);
        m.phase_start_time = known;
        known.is_some()
    }

    pub fn find(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    /// Never fetched, or fetched longer than `max_age` ago.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.fetched_at {
            Some(at) => now - at > max_age,
            None => true,
        }
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.fetched_at = None;
        self.last_error = None;
    }
}
