//! Team data structures.

use serde::{Deserialize, Serialize};

/// Backend-assigned identifier for a team.
pub type TeamId = u64;

/// A team registered for the tournament. Immutable once the tournament is set up.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

impl Team {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Team names are unique case-insensitively, so lookups compare that way.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// A team reference as the backend reports it: either a full team or just its name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeamRef {
    Team(Team),
    Name(String),
}

impl TeamRef {
    pub fn name(&self) -> &str {
        match self {
            TeamRef::Team(team) => &team.name,
            TeamRef::Name(name) => name,
        }
    }
}
