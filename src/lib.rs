//! Prompt Wars console: library with models, business logic and the backend client.

pub mod client;
pub mod config;
pub mod logic;
pub mod models;
pub mod sync;

pub use client::{ApiError, BackendClient};
pub use config::Config;
pub use logic::{
    advance_as_team, advance_match, determine_winner, ArenaView, Bracket, ControlView, PhaseAction,
    PhaseState, Verdict,
};
pub use models::{
    Match, MatchId, MatchPhase, MatchResults, MatchStatus, Role, RoundResult, SessionUser, Slot,
    Stage, Team, TeamId, TournamentError, TournamentId, UserRole,
};
