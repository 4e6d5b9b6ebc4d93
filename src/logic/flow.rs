//! Applying phase actions to a match: the transition plus the round results it implies.
//!
//! Both the admin control panel and the team arena go through `advance_match`;
//! the arena adds a role check in `advance_as_team`.

use crate::logic::arena::{arena_actor, validate_defender_setup};
use crate::logic::phase::{countdown_for, due_expiry, transition, PhaseAction, PhaseState, Transition};
use crate::logic::winner::{determine_match_winner, Verdict};
use crate::models::{
    Match, MatchPhase, MatchStatus, RoundResult, TeamRef, TournamentError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defender's locked-in inputs.
#[derive(Clone, Debug, Deserialize)]
pub struct DefenderSetup {
    pub secret_key: String,
    pub system_prompt: String,
}

impl DefenderSetup {
    /// Both fields are required.
    pub fn validate(&self) -> Result<(), TournamentError> {
        validate_defender_setup(&self.secret_key, &self.system_prompt)
    }

    /// Prompt length as recorded in the round result, in characters.
    pub fn prompt_length(&self) -> u32 {
        self.system_prompt.chars().count() as u32
    }
}

/// What changed, so the caller knows what to send to the backend.
#[derive(Clone, Debug, Serialize)]
pub struct MatchUpdate {
    pub transition: Transition,
    /// Round results were modified and need saving.
    pub results_changed: bool,
    /// Set when the match was finalized.
    pub verdict: Option<Verdict>,
}

/// Apply `action` to `m` at `now`.
///
/// `setup` carries the defender's inputs for a lock-in; without it (an admin force
/// or a timer expiry) the round keeps whatever was recorded so far.
pub fn advance_match(
    m: &mut Match,
    action: PhaseAction,
    setup: Option<&DefenderSetup>,
    now: DateTime<Utc>,
) -> Result<MatchUpdate, TournamentError> {
    let state = PhaseState::of(m);
    if action == PhaseAction::Expire && due_expiry(&state, now).is_none() {
        return Err(TournamentError::InvalidTransition {
            phase: state.phase,
            action: action.as_str(),
        });
    }
    let t = transition(&state, action, now)?;
    let clock = countdown_for(&state);
    if action == PhaseAction::KeyFound && clock.is_none() {
        return Err(TournamentError::MissingPhaseStart(state.phase));
    }
    if let Some(setup) = setup {
        setup.validate()?;
    }

    let round = state.current_round;
    let mut results_changed = false;
    let mut verdict = None;

    match (state.phase, t.to) {
        (MatchPhase::WaitingForDefender, MatchPhase::DefenderSetup) => {
            m.status = MatchStatus::InProgress;
        }
        (MatchPhase::DefenderSetup, MatchPhase::AttackerChat) => {
            let mut result = current_result(m)?;
            if let Some(setup) = setup {
                result.lock_in(&setup.secret_key, &setup.system_prompt);
            }
            store_result(m, round, result)?;
            results_changed = true;
        }
        (MatchPhase::AttackerChat, MatchPhase::RoundComplete) => {
            let mut result = current_result(m)?;
            if let (PhaseAction::KeyFound, Some(clock)) = (action, clock) {
                result.record_extraction(clock.elapsed_secs(now));
            } else if !result.attacker_found_key {
                result.record_failure();
            }
            store_result(m, round, result)?;
            results_changed = true;
        }
        (MatchPhase::RoundComplete, MatchPhase::WaitingForDefender) => {
            let attacker = m.defender(1).map(str::to_string);
            let defender = m.attacker(1).map(str::to_string);
            if let (Some(attacker), Some(defender)) = (attacker, defender) {
                m.results.round2 = Some(RoundResult::new(attacker, defender));
                results_changed = true;
            }
        }
        (MatchPhase::RoundComplete, MatchPhase::MatchComplete) => {
            let v = determine_match_winner(m)?;
            m.winner = v.winner.as_deref().map(|name| {
                m.team1
                    .iter()
                    .chain(m.team2.iter())
                    .find(|team| team.is_named(name))
                    .cloned()
                    .map(TeamRef::Team)
                    .unwrap_or_else(|| TeamRef::Name(name.to_string()))
            });
            m.status = MatchStatus::Completed;
            verdict = Some(v);
        }
        _ => {}
    }

    m.current_phase = t.to;
    m.current_round = t.round;
    m.phase_start_time = t.started_at;
    log::info!(
        "match {}: round {} {} -> {}",
        m.id,
        round,
        t.from,
        t.to
    );
    Ok(MatchUpdate {
        transition: t,
        results_changed,
        verdict,
    })
}

/// `advance_match` for a team acting from the arena: only its own role's actions,
/// and timer expiry once the clock has actually run out.
pub fn advance_as_team(
    m: &mut Match,
    team_name: &str,
    action: PhaseAction,
    setup: Option<&DefenderSetup>,
    now: DateTime<Utc>,
) -> Result<MatchUpdate, TournamentError> {
    let role = m
        .role_of(team_name, m.current_round)
        .ok_or_else(|| TournamentError::TeamNotInMatch(team_name.to_string()))?;
    if action != PhaseAction::Expire {
        match arena_actor(action) {
            Some(expected) if expected != role => {
                return Err(TournamentError::WrongRole { expected });
            }
            Some(_) => {}
            None => return Err(TournamentError::AdminOnly(action.as_str())),
        }
    }
    if action == PhaseAction::LockIn && setup.is_none() {
        return Err(TournamentError::MissingDefenderSetup);
    }
    advance_match(m, action, setup, now)
}

fn current_result(m: &Match) -> Result<RoundResult, TournamentError> {
    m.current_result_or_default()
        .ok_or(TournamentError::MatchNotReady(m.id))
}

fn store_result(m: &mut Match, round: u8, result: RoundResult) -> Result<(), TournamentError> {
    let slot = m
        .results
        .for_round_mut(round)
        .ok_or(TournamentError::InvalidRound(round))?;
    *slot = Some(result);
    Ok(())
}
