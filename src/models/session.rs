//! Logged-in console user.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Team,
}

/// Session user, kept in the console's session cookie between requests.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub username: String,
    pub role: UserRole,
    /// Backend token returned at login.
    pub token: String,
    /// Team the user plays for; only set for team logins.
    #[serde(default)]
    pub team_name: Option<String>,
}

impl SessionUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Name used to find this user's matches. Falls back to the username.
    pub fn team(&self) -> &str {
        self.team_name.as_deref().unwrap_or(&self.username)
    }
}
