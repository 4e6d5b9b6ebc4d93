//! Prompt Wars business logic: phase state machine, winner rule, bracket, arena and chat.

pub mod arena;
pub mod auth;
pub mod bracket;
pub mod chat;
pub mod countdown;
pub mod flow;
pub mod phase;
pub mod roster;
pub mod standings;
pub mod winner;

pub use arena::{find_team_match, validate_defender_setup, ArenaView, ControlView};
pub use bracket::{auto_matchups, validate_manual, Advancement, Bracket, BracketMatch, BRACKET_SIZE};
pub use chat::{contains_secret, ChatTranscript, DangerLevel, MonitorReport};
pub use countdown::{format_clock, Countdown, ATTACKER_CHAT_SECS, DEFENDER_SETUP_SECS};
pub use flow::{advance_as_team, advance_match, DefenderSetup, MatchUpdate};
pub use phase::{due_expiry, progress_percent, transition, PhaseAction, PhaseState, Transition};
pub use roster::{normalize_roster, parse_roster_csv};
pub use standings::{match_counts, recent_results, standings};
pub use winner::{determine_match_winner, determine_winner, MatchSummary, Verdict, WinReason};
