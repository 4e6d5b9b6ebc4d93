//! Server configuration from environment variables, read once at start-up.

use rand::RngCore;
use std::env;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_INACTIVITY_HOURS: u64 = 12;
/// Longest accepted inactivity window (one year).
pub const MAX_INACTIVITY_HOURS: u64 = 24 * 365;
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Cookie signing keys need at least this many bytes.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub session_secret: Vec<u8>,
    pub poll_interval: Duration,
    pub inactivity_timeout: Duration,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(env_value)
    }

    /// Build from any key lookup. Missing or invalid values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT, |p| *p > 0);
        let backend_url = lookup("BACKEND_URL")
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
            .unwrap_or_else(|| {
                if let Some(bad) = lookup("BACKEND_URL") {
                    log::warn!("BACKEND_URL {bad:?} is not an http(s) URL, using {DEFAULT_BACKEND_URL}");
                }
                DEFAULT_BACKEND_URL.to_string()
            })
            .trim_end_matches('/')
            .to_string();
        let session_secret = match lookup("SESSION_SECRET") {
            Some(secret) if secret.len() >= MIN_SESSION_SECRET_LEN => secret.into_bytes(),
            Some(_) => {
                log::warn!(
                    "SESSION_SECRET shorter than {MIN_SESSION_SECRET_LEN} bytes, generating one; sessions will not survive a restart"
                );
                random_secret()
            }
            None => {
                log::warn!("SESSION_SECRET not set, generating one; sessions will not survive a restart");
                random_secret()
            }
        };
        let poll_secs = parse_or(
            "POLL_INTERVAL_SECS",
            lookup("POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
            |s| *s > 0,
        );
        let inactivity_hours = parse_or(
            "INACTIVITY_HOURS",
            lookup("INACTIVITY_HOURS"),
            DEFAULT_INACTIVITY_HOURS,
            |h| (1..=MAX_INACTIVITY_HOURS).contains(h),
        );
        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());

        Self {
            host,
            port,
            backend_url,
            session_secret,
            poll_interval: Duration::from_secs(poll_secs),
            inactivity_timeout: Duration::from_secs(inactivity_hours.saturating_mul(3600)),
            static_dir,
        }
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Trimmed, non-empty environment value.
fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            log::warn!("{key}={raw:?} is invalid, using {default}");
            default
        }
    }
}

fn random_secret() -> Vec<u8> {
    let mut key = vec![0u8; MIN_SESSION_SECRET_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
