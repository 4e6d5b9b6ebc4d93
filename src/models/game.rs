//! Match, Stage, Slot and MatchStatus for two-team attacker/defender matches.

use crate::models::phase::{MatchPhase, Role};
use crate::models::results::{MatchResults, RoundNumber, RoundResult};
use crate::models::team::{Team, TeamRef};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend-assigned identifier for a match.
pub type MatchId = u64;

/// Which side of a match a team occupies (`team1` or `team2`).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    #[default]
    One,
    Two,
}

/// Bracket stage the match belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quarterfinal,
    Semifinal,
    Final,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Quarterfinal, Stage::Semifinal, Stage::Final];

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Quarterfinal => Some(Stage::Semifinal),
            Stage::Semifinal => Some(Stage::Final),
            Stage::Final => None,
        }
    }

    /// Matches played at this stage of an 8-team bracket.
    pub fn match_count(self) -> usize {
        match self {
            Stage::Quarterfinal => 4,
            Stage::Semifinal => 2,
            Stage::Final => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Quarterfinal => "quarterfinal",
            Stage::Semifinal => "semifinal",
            Stage::Final => "final",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Pending,
    #[serde(alias = "in-progress")]
    InProgress,
    Completed,
}

/// A match as the backend stores it, plus the phase bookkeeping of its current round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    #[serde(default, alias = "teamA")]
    pub team1: Option<Team>,
    #[serde(default, alias = "teamB")]
    pub team2: Option<Team>,
    #[serde(default)]
    pub winner: Option<TeamRef>,
    #[serde(default)]
    pub status: MatchStatus,
    pub round: Stage,
    #[serde(default = "first_round", alias = "currentRound")]
    pub current_round: RoundNumber,
    #[serde(default, alias = "currentPhase")]
    pub current_phase: MatchPhase,
    /// Start of the current phase; countdowns are measured from here.
    #[serde(
        default,
        alias = "phaseStartTime",
        deserialize_with = "deserialize_timestamp"
    )]
    pub phase_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: MatchResults,
}

fn first_round() -> RoundNumber {
    1
}

/// Accepts an RFC 3339 string or epoch milliseconds.
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Millis(ms)) => Ok(Utc.timestamp_millis_opt(ms).single()),
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

impl Match {
    /// A fresh pending match between two teams.
    pub fn new(id: MatchId, team1: Option<Team>, team2: Option<Team>, round: Stage) -> Self {
        Self {
            id,
            team1,
            team2,
            winner: None,
            status: MatchStatus::Pending,
            round,
            current_round: 1,
            current_phase: MatchPhase::WaitingForDefender,
            phase_start_time: None,
            results: MatchResults::default(),
        }
    }

    /// Both teams are known.
    pub fn is_ready(&self) -> bool {
        self.team1.is_some() && self.team2.is_some()
    }

    pub fn team(&self, slot: Slot) -> Option<&Team> {
        match slot {
            Slot::One => self.team1.as_ref(),
            Slot::Two => self.team2.as_ref(),
        }
    }

    pub fn slot_of(&self, team_name: &str) -> Option<Slot> {
        if self.team1.as_ref().is_some_and(|t| t.is_named(team_name)) {
            Some(Slot::One)
        } else if self.team2.as_ref().is_some_and(|t| t.is_named(team_name)) {
            Some(Slot::Two)
        } else {
            None
        }
    }

    pub fn involves(&self, team_name: &str) -> bool {
        self.slot_of(team_name).is_some()
    }

    pub fn opponent_of(&self, team_name: &str) -> Option<&Team> {
        match self.slot_of(team_name)? {
            Slot::One => self.team2.as_ref(),
            Slot::Two => self.team1.as_ref(),
        }
    }

    /// Attacking team name for a round. Round 1: team1 attacks; round 2 swaps.
    /// Names recorded in the results take precedence, so round 2 mirrors round 1.
    pub fn attacker(&self, round: RoundNumber) -> Option<&str> {
        if let Some(result) = self.results.for_round(round) {
            if !result.attacker.trim().is_empty() {
                return Some(&result.attacker);
            }
        }
        if round == 2 {
            if let Some(first) = self.results.round1.as_ref() {
                if !first.defender.trim().is_empty() {
                    return Some(&first.defender);
                }
            }
        }
        let slot = match round {
            1 => Slot::One,
            2 => Slot::Two,
            _ => return None,
        };
        self.team(slot).map(|t| t.name.as_str())
    }

    pub fn defender(&self, round: RoundNumber) -> Option<&str> {
        if let Some(result) = self.results.for_round(round) {
            if !result.defender.trim().is_empty() {
                return Some(&result.defender);
            }
        }
        if round == 2 {
            if let Some(first) = self.results.round1.as_ref() {
                if !first.attacker.trim().is_empty() {
                    return Some(&first.attacker);
                }
            }
        }
        let slot = match round {
            1 => Slot::Two,
            2 => Slot::One,
            _ => return None,
        };
        self.team(slot).map(|t| t.name.as_str())
    }

    /// Role `team_name` plays in `round`, if it is in this match.
    pub fn role_of(&self, team_name: &str, round: RoundNumber) -> Option<Role> {
        let name = team_name.trim();
        if self.attacker(round).is_some_and(|a| a.trim().eq_ignore_ascii_case(name)) {
            Some(Role::Attacker)
        } else if self.defender(round).is_some_and(|d| d.trim().eq_ignore_ascii_case(name)) {
            Some(Role::Defender)
        } else {
            None
        }
    }

    pub fn round_result(&self, round: RoundNumber) -> Option<&RoundResult> {
        self.results.for_round(round)
    }

    /// Result of the current round, created from the role assignment when absent.
    pub fn current_result_or_default(&self) -> Option<RoundResult> {
        if let Some(existing) = self.results.for_round(self.current_round) {
            return Some(existing.clone());
        }
        let attacker = self.attacker(self.current_round)?;
        let defender = self.defender(self.current_round)?;
        Some(RoundResult::new(attacker, defender))
    }

    pub fn winner_name(&self) -> Option<&str> {
        self.winner.as_ref().map(TeamRef::name)
    }
}
