//! Winner determination from the two round results of a match.

use crate::logic::countdown::format_clock;
use crate::models::{Match, RoundResult, TournamentError};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    /// Both attackers found the key; the faster one wins.
    FasterExtraction,
    /// Exactly one attacker found the key.
    OnlyExtraction,
    /// Neither key was extracted (or extraction times tied); shorter system prompt wins.
    ShorterPrompt,
    /// Nothing separates the teams; the admin decides in the bracket.
    Draw,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Verdict {
    pub winner: Option<String>,
    pub reason: WinReason,
}

impl Verdict {
    fn won(team: &str, reason: WinReason) -> Self {
        Self {
            winner: Some(team.to_string()),
            reason,
        }
    }
}

/// Decide a match from its two rounds (roles swapped between them).
///
/// 1. Both keys found: smaller `attacker_time` wins. A found key without a time ranks last.
/// 2. One key found: that attacker wins.
/// 3. Otherwise: the defender with the shorter prompt wins.
///
/// Equal times fall through to rule 3; equal prompt lengths are a `Draw`.
pub fn determine_winner(round1: &RoundResult, round2: &RoundResult) -> Verdict {
    match (round1.attacker_found_key, round2.attacker_found_key) {
        (true, true) => {
            let t1 = round1.attacker_time.unwrap_or(u32::MAX);
            let t2 = round2.attacker_time.unwrap_or(u32::MAX);
            match t1.cmp(&t2) {
                Ordering::Less => Verdict::won(&round1.attacker, WinReason::FasterExtraction),
                Ordering::Greater => Verdict::won(&round2.attacker, WinReason::FasterExtraction),
                Ordering::Equal => by_prompt_length(round1, round2),
            }
        }
        (true, false) => Verdict::won(&round1.attacker, WinReason::OnlyExtraction),
        (false, true) => Verdict::won(&round2.attacker, WinReason::OnlyExtraction),
        (false, false) => by_prompt_length(round1, round2),
    }
}

fn by_prompt_length(round1: &RoundResult, round2: &RoundResult) -> Verdict {
    match round1
        .defender_prompt_length
        .cmp(&round2.defender_prompt_length)
    {
        Ordering::Less => Verdict::won(&round1.defender, WinReason::ShorterPrompt),
        Ordering::Greater => Verdict::won(&round2.defender, WinReason::ShorterPrompt),
        Ordering::Equal => Verdict {
            winner: None,
            reason: WinReason::Draw,
        },
    }
}

/// Winner of a match whose two rounds are both recorded.
pub fn determine_match_winner(m: &Match) -> Result<Verdict, TournamentError> {
    match (&m.results.round1, &m.results.round2) {
        (Some(r1), Some(r2)) => Ok(determine_winner(r1, r2)),
        _ => Err(TournamentError::IncompleteResults),
    }
}

/// One team's line in the result view.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TeamSummary {
    pub name: String,
    /// Extraction time when attacking; `None` if the key was not found.
    pub time: Option<u32>,
    pub time_display: String,
    /// Own system prompt length when defending.
    pub system_prompt_length: Option<u32>,
}

/// Result view for a finished (or partially played) match. Without a verdict the
/// match's recorded winner is shown.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MatchSummary {
    pub team_a: TeamSummary,
    pub team_b: TeamSummary,
    pub winner: Option<String>,
    pub reason: Option<WinReason>,
}

impl MatchSummary {
    pub fn build(m: &Match, verdict: Option<&Verdict>) -> Self {
        let name_a = m.team1.as_ref().map(|t| t.name.clone()).unwrap_or_default();
        let name_b = m.team2.as_ref().map(|t| t.name.clone()).unwrap_or_default();
        Self {
            team_a: team_summary(m, name_a),
            team_b: team_summary(m, name_b),
            winner: verdict
                .and_then(|v| v.winner.clone())
                .or_else(|| m.winner_name().map(str::to_string)),
            reason: verdict.map(|v| v.reason),
        }
    }
}

fn team_summary(m: &Match, name: String) -> TeamSummary {
    let rounds = [m.results.round1.as_ref(), m.results.round2.as_ref()];
    let time = rounds
        .iter()
        .flatten()
        .find(|r| r.attacker.trim().eq_ignore_ascii_case(name.trim()))
        .and_then(|r| r.extraction_time());
    let system_prompt_length = rounds
        .iter()
        .flatten()
        .find(|r| r.defender.trim().eq_ignore_ascii_case(name.trim()))
        .map(|r| r.defender_prompt_length);
    TeamSummary {
        name,
        time,
        time_display: format_clock(time),
        system_prompt_length,
    }
}
