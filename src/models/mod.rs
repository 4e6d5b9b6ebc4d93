//! Data structures for Prompt Wars: teams, matches, round results, phases and sessions.

mod game;
mod phase;
mod results;
mod session;
mod team;
mod tournament;

pub(crate) use game::deserialize_timestamp;
pub use game::{Match, MatchId, MatchStatus, Slot, Stage};
pub use phase::{MatchPhase, Role};
pub use results::{MatchResults, RoundNumber, RoundResult};
pub use session::{SessionUser, UserRole};
pub use team::{Team, TeamId, TeamRef};
pub use tournament::{TournamentError, TournamentId};
