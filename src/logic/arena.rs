//! Team arena and admin control views over the shared phase state machine.

use crate::logic::countdown::CountdownSnapshot;
use crate::logic::phase::{countdown_for, progress_percent, PhaseAction, PhaseState};
use crate::models::{Match, MatchPhase, MatchStatus, Role, RoundNumber, TournamentError};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The match a team should see: in progress first, then pending, then its latest completed one.
pub fn find_team_match<'a>(matches: &'a [Match], team_name: &str) -> Option<&'a Match> {
    let mine = || matches.iter().filter(|m| m.involves(team_name));
    mine()
        .find(|m| m.status == MatchStatus::InProgress)
        .or_else(|| mine().find(|m| m.status == MatchStatus::Pending))
        .or_else(|| {
            mine()
                .filter(|m| m.status == MatchStatus::Completed)
                .max_by_key(|m| m.id)
        })
}

/// Check the defender's inputs before locking in.
pub fn validate_defender_setup(secret_key: &str, system_prompt: &str) -> Result<(), TournamentError> {
    if secret_key.trim().is_empty() || system_prompt.trim().is_empty() {
        return Err(TournamentError::MissingDefenderSetup);
    }
    Ok(())
}

/// Role-specific status line shown in the arena.
pub fn status_text(phase: MatchPhase, role: Role, round: RoundNumber) -> &'static str {
    match (phase, role) {
        (MatchPhase::WaitingForDefender, Role::Defender) => {
            "You are the defender. Start the round when ready."
        }
        (MatchPhase::WaitingForDefender, Role::Attacker) => {
            "Waiting for defender to start the round..."
        }
        (MatchPhase::DefenderSetup, Role::Defender) => "Set up your defenses and lock in when ready.",
        (MatchPhase::DefenderSetup, Role::Attacker) => "Defender is setting up defenses...",
        (MatchPhase::AttackerChat, Role::Attacker) => {
            "You are the attacker. Try to extract the secret key."
        }
        (MatchPhase::AttackerChat, Role::Defender) => {
            "Attacker is attempting to extract your secret key..."
        }
        (MatchPhase::RoundComplete, _) if round == 1 => {
            "Round 1 complete. Preparing for role swap..."
        }
        (MatchPhase::RoundComplete, _) => "Match complete. Calculating results...",
        (MatchPhase::MatchComplete, _) => "Match complete. View the results.",
    }
}

/// Who may perform a phase action from the arena. Expiry is system-driven.
pub fn arena_actor(action: PhaseAction) -> Option<Role> {
    match action {
        PhaseAction::StartRound | PhaseAction::LockIn => Some(Role::Defender),
        PhaseAction::KeyFound => Some(Role::Attacker),
        _ => None,
    }
}

/// Arena page state for one team.
#[derive(Clone, Debug, Serialize)]
pub struct ArenaView {
    pub match_id: u64,
    pub team: String,
    pub opponent: Option<String>,
    pub role: Role,
    pub phase: MatchPhase,
    pub current_round: RoundNumber,
    pub status: MatchStatus,
    pub status_text: &'static str,
    pub countdown: Option<CountdownSnapshot>,
    pub actions: Vec<PhaseAction>,
    /// Defender has locked in this round.
    pub defender_locked: bool,
    pub winner: Option<String>,
}

impl ArenaView {
    pub fn for_team(m: &Match, team_name: &str, now: DateTime<Utc>) -> Result<Self, TournamentError> {
        let role = m
            .role_of(team_name, m.current_round)
            .ok_or_else(|| TournamentError::TeamNotInMatch(team_name.to_string()))?;
        let state = PhaseState::of(m);
        let actions = match (m.current_phase, role) {
            (MatchPhase::WaitingForDefender, Role::Defender) => vec![PhaseAction::StartRound],
            (MatchPhase::DefenderSetup, Role::Defender) => vec![PhaseAction::LockIn],
            (MatchPhase::AttackerChat, Role::Attacker) => vec![PhaseAction::KeyFound],
            _ => Vec::new(),
        };
        Ok(Self {
            match_id: m.id,
            team: team_name.to_string(),
            opponent: m.opponent_of(team_name).map(|t| t.name.clone()),
            role,
            phase: m.current_phase,
            current_round: m.current_round,
            status: m.status,
            status_text: status_text(m.current_phase, role, m.current_round),
            countdown: countdown_for(&state).map(|c| c.snapshot(now)),
            actions,
            defender_locked: matches!(
                m.current_phase,
                MatchPhase::AttackerChat | MatchPhase::RoundComplete | MatchPhase::MatchComplete
            ),
            winner: m.winner_name().map(str::to_string),
        })
    }
}

/// One round's card on the control panel.
#[derive(Clone, Debug, Serialize)]
pub struct RoundCard {
    pub round: RoundNumber,
    pub attacker: Option<String>,
    pub defender: Option<String>,
    pub active: bool,
    pub finished: bool,
    pub key_found: Option<bool>,
    pub attacker_time: Option<u32>,
}

/// Admin control panel state for one match.
#[derive(Clone, Debug, Serialize)]
pub struct ControlView {
    pub match_id: u64,
    pub teams: [Option<String>; 2],
    pub phase: MatchPhase,
    pub phase_label: String,
    pub current_round: RoundNumber,
    pub completed: bool,
    pub progress_percent: u32,
    pub rounds: [RoundCard; 2],
    pub countdown: Option<CountdownSnapshot>,
    pub actions: Vec<PhaseAction>,
}

impl ControlView {
    pub fn build(m: &Match, now: DateTime<Utc>) -> Self {
        let state = PhaseState::of(m);
        let actions = match (m.current_phase, m.current_round) {
            (MatchPhase::WaitingForDefender, _) => vec![PhaseAction::StartRound],
            (MatchPhase::DefenderSetup, _) => vec![PhaseAction::LockIn],
            (MatchPhase::AttackerChat, _) => vec![PhaseAction::EndAttack],
            (MatchPhase::RoundComplete, 1) => vec![PhaseAction::SwapRoles],
            (MatchPhase::RoundComplete, _) => vec![PhaseAction::Finalize],
            (MatchPhase::MatchComplete, _) => Vec::new(),
        };
        let completed = m.current_phase == MatchPhase::MatchComplete;
        Self {
            match_id: m.id,
            teams: [
                m.team1.as_ref().map(|t| t.name.clone()),
                m.team2.as_ref().map(|t| t.name.clone()),
            ],
            phase: m.current_phase,
            phase_label: m.current_phase.label(),
            current_round: m.current_round,
            completed,
            progress_percent: progress_percent(m.current_phase, m.current_round),
            rounds: [round_card(m, 1), round_card(m, 2)],
            countdown: countdown_for(&state).map(|c| c.snapshot(now)),
            actions,
        }
    }
}

fn round_card(m: &Match, round: RoundNumber) -> RoundCard {
    let completed = m.current_phase == MatchPhase::MatchComplete;
    let finished = completed
        || m.current_round > round
        || (m.current_round == round && m.current_phase == MatchPhase::RoundComplete);
    let result = m.results.for_round(round);
    RoundCard {
        round,
        attacker: m.attacker(round).map(str::to_string),
        defender: m.defender(round).map(str::to_string),
        active: m.current_round == round && !completed,
        finished,
        key_found: result.filter(|_| finished).map(|r| r.attacker_found_key),
        attacker_time: result.filter(|_| finished).and_then(|r| r.extraction_time()),
    }
}
