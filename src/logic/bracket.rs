//! Single-elimination bracket: 8 teams, quarterfinals -> semifinals -> final.
//!
//! Quarterfinal `i` feeds semifinal `i / 2`, as `team1` when `i` is even and `team2`
//! when odd; the two semifinals feed the final the same way.

use crate::models::{Match, MatchId, MatchStatus, Slot, Stage, Team, TeamId, TournamentError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Teams in a full bracket.
pub const BRACKET_SIZE: usize = 8;

/// A match slot in the bracket view.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BracketMatch {
    pub id: MatchId,
    pub team1: Option<Team>,
    pub team2: Option<Team>,
    pub winner: Option<Team>,
    pub status: MatchStatus,
    pub round: Stage,
}

impl BracketMatch {
    fn empty(id: MatchId, round: Stage) -> Self {
        Self {
            id,
            team1: None,
            team2: None,
            winner: None,
            status: MatchStatus::Pending,
            round,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.team1.is_some() && self.team2.is_some()
    }

    fn set_slot(&mut self, slot: Slot, team: Option<Team>) {
        match slot {
            Slot::One => self.team1 = team,
            Slot::Two => self.team2 = team,
        }
    }

    fn team_by_id(&self, team_id: TeamId) -> Option<&Team> {
        self.team1
            .iter()
            .chain(self.team2.iter())
            .find(|t| t.id == team_id)
    }

    fn loser(&self) -> Option<&Team> {
        let winner = self.winner.as_ref()?;
        self.team1
            .iter()
            .chain(self.team2.iter())
            .find(|t| t.id != winner.id)
    }
}

/// Where a selected winner was placed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Advancement {
    pub stage: Stage,
    pub match_id: MatchId,
    pub slot: Slot,
    pub team: Team,
    /// Both teams of the receiving match are now known.
    pub match_ready: bool,
}

/// Full bracket state. Match ids: quarterfinals 1-4, semifinals 5-6, final 7.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub quarterfinals: Vec<BracketMatch>,
    pub semifinals: Vec<BracketMatch>,
    #[serde(rename = "final")]
    pub finals: Vec<BracketMatch>,
}

impl Default for Bracket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bracket {
    pub fn new() -> Self {
        Self {
            quarterfinals: (1..=4)
                .map(|id| BracketMatch::empty(id, Stage::Quarterfinal))
                .collect(),
            semifinals: (5..=6)
                .map(|id| BracketMatch::empty(id, Stage::Semifinal))
                .collect(),
            finals: vec![BracketMatch::empty(7, Stage::Final)],
        }
    }

    pub fn stage(&self, stage: Stage) -> &[BracketMatch] {
        match stage {
            Stage::Quarterfinal => &self.quarterfinals,
            Stage::Semifinal => &self.semifinals,
            Stage::Final => &self.finals,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut Vec<BracketMatch> {
        match stage {
            Stage::Quarterfinal => &mut self.quarterfinals,
            Stage::Semifinal => &mut self.semifinals,
            Stage::Final => &mut self.finals,
        }
    }

    pub fn find(&self, stage: Stage, match_id: MatchId) -> Option<&BracketMatch> {
        self.stage(stage).iter().find(|m| m.id == match_id)
    }

    /// Clear everything: teams, winners and statuses.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Place four quarterfinal pairings (8 distinct teams). Resets later rounds.
    pub fn seed(&mut self, matchups: &[(Team, Team)]) -> Result<(), TournamentError> {
        let needed = Stage::Quarterfinal.match_count();
        if matchups.len() != needed {
            return Err(TournamentError::WrongNumberOfTeams {
                needed: BRACKET_SIZE,
                got: matchups.len() * 2,
            });
        }
        ensure_distinct(matchups.iter().flat_map(|(a, b)| [a, b]))?;

        self.reset();
        for (m, (a, b)) in self.quarterfinals.iter_mut().zip(matchups) {
            m.team1 = Some(a.clone());
            m.team2 = Some(b.clone());
        }
        Ok(())
    }

    /// Rebuild one stage from backend matchups (pairs of team names).
    pub fn load_stage(
        &mut self,
        stage: Stage,
        pairs: &[Vec<String>],
        teams: &[Team],
    ) -> Result<(), TournamentError> {
        if pairs.len() > stage.match_count() {
            return Err(TournamentError::InvalidRoster(format!(
                "{} matchups for the {} stage",
                pairs.len(),
                stage.as_str()
            )));
        }
        let resolve = |name: &String| -> Result<Team, TournamentError> {
            teams
                .iter()
                .find(|t| t.is_named(name))
                .cloned()
                .ok_or_else(|| TournamentError::InvalidRoster(format!("unknown team {}", name)))
        };
        let mut resolved = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if pair.len() != 2 {
                return Err(TournamentError::InvalidRoster(format!(
                    "matchup with {} teams",
                    pair.len()
                )));
            }
            resolved.push((resolve(&pair[0])?, resolve(&pair[1])?));
        }
        ensure_distinct(resolved.iter().flat_map(|(a, b)| [a, b]))?;

        for (m, (a, b)) in self.stage_mut(stage).iter_mut().zip(resolved) {
            m.team1 = Some(a);
            m.team2 = Some(b);
        }
        Ok(())
    }

    /// Record `team_id` as the winner of `match_id` and move it into the next stage.
    ///
    /// Returns where the winner landed (`None` for the final). A winner may be changed
    /// until the match it fed into has been decided.
    pub fn select_winner(
        &mut self,
        stage: Stage,
        match_id: MatchId,
        team_id: TeamId,
    ) -> Result<Option<Advancement>, TournamentError> {
        let index = self
            .stage(stage)
            .iter()
            .position(|m| m.id == match_id)
            .ok_or(TournamentError::MatchNotFound(match_id))?;
        let current = &self.stage(stage)[index];
        if !current.is_ready() {
            return Err(TournamentError::MatchNotReady(match_id));
        }
        let winner = current
            .team_by_id(team_id)
            .cloned()
            .ok_or(TournamentError::TeamNotFound(team_id))?;

        let changing = current.winner.as_ref().is_some_and(|w| w.id != winner.id);
        let next_index = index / 2;
        let slot = if index % 2 == 0 { Slot::One } else { Slot::Two };
        if let Some(next) = stage.next() {
            if changing && self.stage(next)[next_index].winner.is_some() {
                return Err(TournamentError::AlreadyDecided(match_id));
            }
        }

        let current = &mut self.stage_mut(stage)[index];
        current.winner = Some(winner.clone());
        current.status = MatchStatus::Completed;

        let next = match stage.next() {
            Some(next) => next,
            None => return Ok(None),
        };
        let target = &mut self.stage_mut(next)[next_index];
        target.set_slot(slot, Some(winner.clone()));
        let match_ready = target.is_ready();
        if match_ready && target.winner.is_none() && target.status != MatchStatus::InProgress {
            target.status = MatchStatus::Pending;
        }
        log::debug!(
            "{} advanced from {} {} to {} {}",
            winner.name,
            stage.as_str(),
            match_id,
            next.as_str(),
            target.id
        );
        Ok(Some(Advancement {
            stage: next,
            match_id: target.id,
            slot,
            team: winner,
            match_ready,
        }))
    }

    /// Advance the winner of a finished backend match into the bracket.
    pub fn advance_from_match(&mut self, m: &Match) -> Result<Option<Advancement>, TournamentError> {
        let winner_name = m.winner_name().ok_or(TournamentError::IncompleteResults)?;
        let (a, b) = match (&m.team1, &m.team2) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(TournamentError::MatchNotReady(m.id)),
        };
        let slot = self
            .stage(m.round)
            .iter()
            .find(|bm| {
                let names: Vec<&Team> = bm.team1.iter().chain(bm.team2.iter()).collect();
                names.len() == 2
                    && names.iter().any(|t| t.is_named(&a.name))
                    && names.iter().any(|t| t.is_named(&b.name))
            })
            .ok_or(TournamentError::MatchNotFound(m.id))?;
        let bracket_id = slot.id;
        let team_id = slot
            .team1
            .iter()
            .chain(slot.team2.iter())
            .find(|t| t.is_named(winner_name))
            .map(|t| t.id)
            .ok_or_else(|| TournamentError::TeamNotInMatch(winner_name.to_string()))?;
        self.select_winner(m.round, bracket_id, team_id)
    }

    /// Mark a ready match as being played.
    pub fn set_in_progress(&mut self, stage: Stage, match_id: MatchId) -> Result<(), TournamentError> {
        let m = self
            .stage_mut(stage)
            .iter_mut()
            .find(|m| m.id == match_id)
            .ok_or(TournamentError::MatchNotFound(match_id))?;
        if !m.is_ready() {
            return Err(TournamentError::MatchNotReady(match_id));
        }
        if m.status == MatchStatus::Completed {
            return Err(TournamentError::AlreadyDecided(match_id));
        }
        m.status = MatchStatus::InProgress;
        Ok(())
    }

    /// Team-name pairs of a stage, once every match in it has both teams.
    pub fn pairings(&self, stage: Stage) -> Option<Vec<[String; 2]>> {
        self.stage(stage)
            .iter()
            .map(|m| match (&m.team1, &m.team2) {
                (Some(a), Some(b)) => Some([a.name.clone(), b.name.clone()]),
                _ => None,
            })
            .collect()
    }

    pub fn champion(&self) -> Option<&Team> {
        self.finals.first().and_then(|m| m.winner.as_ref())
    }

    /// Matches with a winner.
    pub fn played_count(&self) -> usize {
        Stage::ALL
            .iter()
            .flat_map(|s| self.stage(*s))
            .filter(|m| m.winner.is_some())
            .count()
    }

    /// Teams that have lost a match.
    pub fn eliminated(&self) -> Vec<&Team> {
        Stage::ALL
            .iter()
            .flat_map(|s| self.stage(*s))
            .filter_map(BracketMatch::loser)
            .collect()
    }
}

fn ensure_distinct<'a>(teams: impl Iterator<Item = &'a Team>) -> Result<(), TournamentError> {
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for t in teams {
        if !ids.insert(t.id) || !names.insert(t.name.trim().to_lowercase()) {
            return Err(TournamentError::DuplicateTeamName(t.name.clone()));
        }
    }
    Ok(())
}

/// Shuffle 8 teams and pair them off in order.
pub fn auto_matchups<R: Rng + ?Sized>(
    teams: &[Team],
    rng: &mut R,
) -> Result<Vec<(Team, Team)>, TournamentError> {
    if teams.len() != BRACKET_SIZE {
        return Err(TournamentError::WrongNumberOfTeams {
            needed: BRACKET_SIZE,
            got: teams.len(),
        });
    }
    ensure_distinct(teams.iter())?;
    let mut shuffled = teams.to_vec();
    shuffled.shuffle(rng);
    Ok(shuffled
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Resolve admin-chosen pairs of team ids: 4 pairs covering 8 distinct known teams.
pub fn validate_manual(
    teams: &[Team],
    pairs: &[(TeamId, TeamId)],
) -> Result<Vec<(Team, Team)>, TournamentError> {
    if pairs.len() != Stage::Quarterfinal.match_count() {
        return Err(TournamentError::WrongNumberOfTeams {
            needed: BRACKET_SIZE,
            got: pairs.len() * 2,
        });
    }
    let lookup = |id: TeamId| {
        teams
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(TournamentError::TeamNotFound(id))
    };
    let resolved = pairs
        .iter()
        .map(|&(a, b)| Ok((lookup(a)?, lookup(b)?)))
        .collect::<Result<Vec<_>, TournamentError>>()?;
    ensure_distinct(resolved.iter().flat_map(|(a, b)| [a, b]))?;
    Ok(resolved)
}
