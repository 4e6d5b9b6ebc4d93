//! Tournament identifier and the domain error type.

use crate::models::game::MatchId;
use crate::models::phase::{MatchPhase, Role};
use crate::models::results::RoundNumber;
use crate::models::team::TeamId;

/// Tournament identifier issued by the backend at team registration.
pub type TournamentId = String;

/// Errors that can occur while running matches, the bracket or the arena.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TournamentError {
    /// The action is not allowed in the match's current phase.
    InvalidTransition {
        phase: MatchPhase,
        action: &'static str,
    },
    /// Defender tried to lock in without a secret key or system prompt.
    MissingDefenderSetup,
    /// Login attempted with an empty username or password.
    MissingCredentials,
    /// The action belongs to the other role this round.
    WrongRole { expected: Role },
    /// Teams cannot perform this action; the admin drives it.
    AdminOnly(&'static str),
    MatchNotFound(MatchId),
    TeamNotFound(TeamId),
    /// Team is not one of the match's two teams.
    TeamNotInMatch(String),
    /// Team has no match in the current tournament.
    NoActiveMatch(String),
    /// Match does not have both teams yet.
    MatchNotReady(MatchId),
    /// Winner cannot change: the next round's match is already decided.
    AlreadyDecided(MatchId),
    WrongNumberOfTeams { needed: usize, got: usize },
    /// Team names are unique (case-insensitive).
    DuplicateTeamName(String),
    /// Finalizing needs both round results.
    IncompleteResults,
    /// A timed phase whose start time is unknown, so no time can be measured.
    MissingPhaseStart(MatchPhase),
    EmptyMessage,
    /// The attack phase is over; no more chat for this round.
    ChatClosed,
    InvalidRoster(String),
    InvalidRound(RoundNumber),
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentError::InvalidTransition { phase, action } => {
                write!(f, "Cannot {} while the match is in {}", action, phase.label())
            }
            TournamentError::MissingDefenderSetup => {
                write!(f, "Secret key and system prompt are required")
            }
            TournamentError::MissingCredentials => write!(f, "Username and password are required"),
            TournamentError::WrongRole { expected } => {
                write!(f, "Only the {} can do this right now", expected)
            }
            TournamentError::AdminOnly(action) => write!(f, "Only the admin can {}", action),
            TournamentError::MatchNotFound(id) => write!(f, "Match {} not found", id),
            TournamentError::TeamNotFound(id) => write!(f, "Team {} not found", id),
            TournamentError::TeamNotInMatch(name) => write!(f, "{} is not playing in this match", name),
            TournamentError::NoActiveMatch(name) => write!(f, "No match found for {}", name),
            TournamentError::MatchNotReady(id) => write!(f, "Match {} does not have both teams yet", id),
            TournamentError::AlreadyDecided(id) => {
                write!(f, "Match {} feeds a match that is already decided", id)
            }
            TournamentError::WrongNumberOfTeams { needed, got } => {
                write!(f, "Need exactly {} teams (got {})", needed, got)
            }
            TournamentError::DuplicateTeamName(name) => {
                write!(f, "A team named {} already exists", name)
            }
            TournamentError::IncompleteResults => write!(f, "Both rounds need results first"),
            TournamentError::MissingPhaseStart(phase) => {
                write!(f, "No start time is known for the {} phase", phase.label())
            }
            TournamentError::EmptyMessage => write!(f, "Message is empty"),
            TournamentError::ChatClosed => write!(f, "The attack phase is over"),
            TournamentError::InvalidRoster(reason) => write!(f, "Invalid team list: {}", reason),
            TournamentError::InvalidRound(round) => write!(f, "Round {} does not exist", round),
        }
    }
}

impl std::error::Error for TournamentError {}
