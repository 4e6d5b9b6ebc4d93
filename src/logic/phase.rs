//! Match phase state machine, shared by the admin control panel and the team arena.
//!
//! `waiting_for_defender -> defender_setup -> attacker_chat -> round_complete`, then
//! either a role swap back to `waiting_for_defender` (round 1) or `match_complete`
//! (round 2). Timer expiry goes through the same `transition` as a manual skip.

use crate::logic::countdown::{Countdown, ATTACKER_CHAT_SECS, DEFENDER_SETUP_SECS};
use crate::models::{Match, MatchPhase, RoundNumber, TournamentError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase bookkeeping of one match.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PhaseState {
    pub phase: MatchPhase,
    pub current_round: RoundNumber,
    pub phase_started_at: Option<DateTime<Utc>>,
}

impl PhaseState {
    pub fn new() -> Self {
        Self {
            phase: MatchPhase::WaitingForDefender,
            current_round: 1,
            phase_started_at: None,
        }
    }

    pub fn of(m: &Match) -> Self {
        Self {
            phase: m.current_phase,
            current_round: m.current_round,
            phase_started_at: m.phase_start_time,
        }
    }

    /// Apply a transition's target onto this state.
    pub fn apply(&mut self, transition: &Transition) {
        self.phase = transition.to;
        self.current_round = transition.round;
        self.phase_started_at = transition.started_at;
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseAction {
    /// Defender (or admin) starts the round: begins the setup countdown.
    StartRound,
    /// Defender locks in secret and prompt, or admin forces it.
    LockIn,
    /// Attacker's message contained the secret key.
    KeyFound,
    /// Admin ends the attack phase early.
    EndAttack,
    /// The running countdown ran out.
    Expire,
    /// After round 1: swap attacker and defender and go to round 2.
    SwapRoles,
    /// After round 2: compute the winner.
    Finalize,
}

impl PhaseAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseAction::StartRound => "start the round",
            PhaseAction::LockIn => "lock in",
            PhaseAction::KeyFound => "report the key",
            PhaseAction::EndAttack => "end the attack",
            PhaseAction::Expire => "expire the timer",
            PhaseAction::SwapRoles => "swap roles",
            PhaseAction::Finalize => "finalize the match",
        }
    }
}

/// Result of a legal move.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Transition {
    pub from: MatchPhase,
    pub to: MatchPhase,
    pub round: RoundNumber,
    /// New phase start time (set for every phase entered at `now`).
    pub started_at: Option<DateTime<Utc>>,
    /// Countdown started by this transition.
    pub countdown: Option<Countdown>,
    /// Attacker and defender trade places (round 1 -> 2).
    pub swap_roles: bool,
    /// The current round's attack just ended.
    pub round_finished: bool,
}

/// Countdown length of a timed phase.
pub fn phase_duration(phase: MatchPhase) -> Option<u32> {
    match phase {
        MatchPhase::DefenderSetup => Some(DEFENDER_SETUP_SECS),
        MatchPhase::AttackerChat => Some(ATTACKER_CHAT_SECS),
        _ => None,
    }
}

/// The only place phase rules live.
pub fn transition(
    state: &PhaseState,
    action: PhaseAction,
    now: DateTime<Utc>,
) -> Result<Transition, TournamentError> {
    use MatchPhase::*;
    use PhaseAction::*;

    if !(1..=2).contains(&state.current_round) {
        return Err(TournamentError::InvalidRound(state.current_round));
    }

    let (to, round, swap_roles) = match (state.phase, action) {
        (WaitingForDefender, StartRound) => (DefenderSetup, state.current_round, false),
        (DefenderSetup, LockIn | Expire) => (AttackerChat, state.current_round, false),
        (AttackerChat, KeyFound | EndAttack | Expire) => (RoundComplete, state.current_round, false),
        (RoundComplete, SwapRoles) if state.current_round == 1 => (WaitingForDefender, 2, true),
        (RoundComplete, Finalize) if state.current_round == 2 => (MatchComplete, 2, false),
        (phase, action) => {
            return Err(TournamentError::InvalidTransition {
                phase,
                action: action.as_str(),
            })
        }
    };

    let countdown = phase_duration(to).map(|secs| Countdown::new(now, secs));
    Ok(Transition {
        from: state.phase,
        to,
        round,
        started_at: Some(now),
        countdown,
        swap_roles,
        round_finished: to == RoundComplete,
    })
}

/// Running countdown of the current phase, if it is timed and has a start time.
pub fn countdown_for(state: &PhaseState) -> Option<Countdown> {
    let secs = phase_duration(state.phase)?;
    state.phase_started_at.map(|start| Countdown::new(start, secs))
}

/// `Some(Expire)` once the current phase's countdown has run out.
pub fn due_expiry(state: &PhaseState, now: DateTime<Utc>) -> Option<PhaseAction> {
    countdown_for(state)
        .filter(|c| c.is_expired(now))
        .map(|_| PhaseAction::Expire)
}

/// Progress through the whole match, 0..=100.
pub fn progress_percent(phase: MatchPhase, round: RoundNumber) -> u32 {
    let base = if round >= 2 { 50 } else { 0 };
    match phase {
        MatchPhase::WaitingForDefender => base,
        MatchPhase::DefenderSetup => base + 15,
        MatchPhase::AttackerChat => base + 30,
        MatchPhase::RoundComplete => base + 45,
        MatchPhase::MatchComplete => 100,
    }
}
