//! Login checks and page routing by role.

use crate::models::{SessionUser, TournamentError, UserRole};

pub const LOGIN_PATH: &str = "/";
pub const ADMIN_HOME: &str = "/admin/dashboard";
pub const ARENA_HOME: &str = "/arena";

pub fn validate_login(username: &str, password: &str) -> Result<(), TournamentError> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(TournamentError::MissingCredentials);
    }
    Ok(())
}

pub fn landing_path(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => ADMIN_HOME,
        UserRole::Team => ARENA_HOME,
    }
}

/// Where to send a visitor of `path`, or `None` to let the page render.
///
/// Anonymous users only see the login page; teams are kept out of `/admin`, admins
/// out of `/arena`, and a logged-in user on the login page goes to their home.
pub fn route_guard(user: Option<&SessionUser>, path: &str) -> Option<&'static str> {
    let Some(user) = user else {
        return (path != LOGIN_PATH).then_some(LOGIN_PATH);
    };
    if path == LOGIN_PATH {
        return Some(landing_path(user.role));
    }
    match user.role {
        UserRole::Team if path.starts_with("/admin") => Some(ARENA_HOME),
        UserRole::Admin if path.starts_with("/arena") => Some(ADMIN_HOME),
        _ => None,
    }
}
