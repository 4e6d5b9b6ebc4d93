//! Match phases and the two roles a team can play in a round.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a match is within its current round.
///
/// Phases only move forward, except that swapping roles after round 1 re-enters
/// `WaitingForDefender` for round 2.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    #[default]
    WaitingForDefender,
    DefenderSetup,
    AttackerChat,
    RoundComplete,
    MatchComplete,
}

impl MatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::WaitingForDefender => "waiting_for_defender",
            MatchPhase::DefenderSetup => "defender_setup",
            MatchPhase::AttackerChat => "attacker_chat",
            MatchPhase::RoundComplete => "round_complete",
            MatchPhase::MatchComplete => "match_complete",
        }
    }

    /// Human readable label ("defender setup").
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Phases gated by a countdown.
    pub fn is_timed(self) -> bool {
        matches!(self, MatchPhase::DefenderSetup | MatchPhase::AttackerChat)
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attacker,
    Defender,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Attacker => f.write_str("attacker"),
            Role::Defender => f.write_str("defender"),
        }
    }
}
