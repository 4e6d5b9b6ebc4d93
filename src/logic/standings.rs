//! Dashboard standings from completed matches.

use crate::models::{Match, MatchStatus, Stage, Team};
use serde::Serialize;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Standing {
    pub team: Team,
    pub wins: u32,
    pub losses: u32,
}

/// Wins and losses per team, best first (wins desc, losses asc, then name).
pub fn standings(teams: &[Team], matches: &[Match]) -> Vec<Standing> {
    let mut table: Vec<Standing> = teams
        .iter()
        .map(|t| Standing {
            team: t.clone(),
            wins: 0,
            losses: 0,
        })
        .collect();

    for m in matches.iter().filter(|m| m.status == MatchStatus::Completed) {
        let Some(winner) = m.winner_name() else {
            continue;
        };
        for team in m.team1.iter().chain(m.team2.iter()) {
            if let Some(row) = table.iter_mut().find(|s| s.team.id == team.id) {
                if team.is_named(winner) {
                    row.wins += 1;
                } else {
                    row.losses += 1;
                }
            }
        }
    }

    table.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(a.losses.cmp(&b.losses))
            .then_with(|| a.team.name.to_lowercase().cmp(&b.team.name.to_lowercase()))
    });
    table
}

/// One finished match on the dashboard feed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RecentResult {
    pub match_id: u64,
    pub round: Stage,
    pub teams: [String; 2],
    pub winner: String,
}

/// Latest `limit` completed matches, newest (highest id) first.
pub fn recent_results(matches: &[Match], limit: usize) -> Vec<RecentResult> {
    let mut done: Vec<&Match> = matches
        .iter()
        .filter(|m| m.status == MatchStatus::Completed && m.winner.is_some())
        .collect();
    done.sort_by(|a, b| b.id.cmp(&a.id));
    done.into_iter()
        .take(limit)
        .map(|m| RecentResult {
            match_id: m.id,
            round: m.round,
            teams: [
                m.team1.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
                m.team2.as_ref().map(|t| t.name.clone()).unwrap_or_default(),
            ],
            winner: m.winner_name().unwrap_or_default().to_string(),
        })
        .collect()
}

/// Match counts per status for the dashboard tiles.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MatchCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

pub fn match_counts(matches: &[Match]) -> MatchCounts {
    let mut counts = MatchCounts::default();
    for m in matches {
        match m.status {
            MatchStatus::Pending => counts.pending += 1,
            MatchStatus::InProgress => counts.in_progress += 1,
            MatchStatus::Completed => counts.completed += 1,
        }
    }
    counts
}
