//! HTTP client for the Prompt Wars backend (auth, tournament and match endpoints).
//!
//! The backend owns teams, matches, phase timers and persistence. Every call is a
//! single request: no retries, no caching. Failures come back as `ApiError` with the
//! most useful message the response offered.

use crate::models::{
    Match, MatchId, MatchPhase, MatchResults, RoundNumber, Stage, Team, TeamRef, UserRole,
};
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A failed backend call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiError {
    /// Could not reach the backend or read its response.
    Request(String),
    /// Non-2xx status, with the message extracted from the body.
    Status { status: u16, message: String },
    /// The response was not the JSON we expected.
    Decode(String),
    /// 2xx response that reported `success: false`.
    Rejected(String),
}

impl ApiError {
    /// Message suitable for a user-facing notification.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Request(m) | ApiError::Decode(m) | ApiError::Rejected(m) => m,
            ApiError::Status { message, .. } => message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Request(m) => write!(f, "Backend request failed: {}", m),
            ApiError::Status { status, message } => write!(f, "Backend error {}: {}", status, message),
            ApiError::Decode(m) => write!(f, "Unexpected backend response: {}", m),
            ApiError::Rejected(m) => write!(f, "{}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// Best-effort error message from a response body: FastAPI `detail` (string or
/// validation list), then `message`, then `error`, then short plain text.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(detail) = value.get("detail") {
            match detail {
                Value::String(s) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                Value::Array(items) => {
                    let msgs: Vec<&str> = items
                        .iter()
                        .filter_map(|item| item.get("msg").and_then(Value::as_str))
                        .collect();
                    if !msgs.is_empty() {
                        return Some(msgs.join(", "));
                    }
                }
                _ => {}
            }
        }
        for key in ["message", "error"] {
            if let Some(s) = value.get(key).and_then(Value::as_str) {
                if !s.trim().is_empty() {
                    return Some(s.trim().to_string());
                }
            }
        }
        return None;
    }
    if trimmed.starts_with('<') || trimmed.len() > 200 {
        return None;
    }
    Some(trimmed.to_string())
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub role: UserRole,
    pub token: String,
    #[serde(default, alias = "teamName")]
    pub team_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterTeamsResponse {
    #[serde(default)]
    pub success: bool,
    pub tournament_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct TeamsResponse {
    #[serde(default)]
    teams: Vec<Team>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct MatchupsResponse {
    #[serde(default)]
    matchups: Vec<Vec<String>>,
}

/// `GET /matches` answers with a bare list; some deployments wrap it.
#[derive(Deserialize)]
#[serde(untagged)]
enum MatchList {
    Bare(Vec<Match>),
    Wrapped { matches: Vec<Match> },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PhaseResponse {
    #[serde(
        default,
        alias = "phaseStartTime",
        deserialize_with = "crate::models::deserialize_timestamp"
    )]
    pub phase_start_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct FinalizeResponse {
    #[serde(default)]
    pub winner: Option<TeamRef>,
}

#[derive(Serialize)]
struct PhaseUpdate<'a> {
    phase: &'a str,
    current_round: RoundNumber,
}

/// Client for one backend. Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("prompt-wars-console")
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Same client, sending `token` as a bearer credential.
    pub fn with_token(&self, token: &str) -> Self {
        let token = token.trim();
        Self {
            token: (!token.is_empty()).then(|| token.to_string()),
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, label: &str) -> Result<T, ApiError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let resp = request.send().await.map_err(|e| {
            log::warn!("{label}: request failed: {e}");
            ApiError::Request(e.to_string())
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            log::warn!("{label}: read failed: {e}");
            ApiError::Request(e.to_string())
        })?;
        log::debug!("{label}: status {status}, {} bytes", body.len());

        if !status.is_success() {
            let message = extract_error_message(&body).unwrap_or_else(|| status_text(status));
            log::warn!("{label}: backend returned {status}: {message}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let value: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{label}: {e}")))?
        };
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = extract_error_message(&body).unwrap_or_else(|| format!("{label} was rejected"));
            return Err(ApiError::Rejected(message));
        }
        serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("{label}: {e}")))
    }

    // ── Auth and tournament setup ──────────────────────────────────────

    pub async fn login(&self, username: &str, password: &str, role: UserRole) -> Result<LoginResponse, ApiError> {
        let body = json!({ "username": username, "password": password, "role": role });
        self.send(self.http.post(self.url("/auth/login")).json(&body), "login")
            .await
    }

    pub async fn register_teams_bulk(&self, team_names: &[String]) -> Result<RegisterTeamsResponse, ApiError> {
        let body = json!({ "team_names": team_names });
        self.send(
            self.http.post(self.url("/auth/register-teams-bulk")).json(&body),
            "register teams",
        )
        .await
    }

    pub async fn list_teams(&self, tournament_id: &str) -> Result<Vec<Team>, ApiError> {
        let resp: TeamsResponse = self
            .send(
                self.http
                    .get(self.url("/auth/teams"))
                    .query(&[("tournament_id", tournament_id)]),
                "list teams",
            )
            .await?;
        Ok(resp.teams)
    }

    pub async fn reset_tournament(&self, tournament_id: &str) -> Result<String, ApiError> {
        let resp: MessageResponse = self
            .send(
                self.http
                    .post(self.url("/auth/reset-tournament"))
                    .query(&[("tournament_id", tournament_id)]),
                "reset tournament",
            )
            .await?;
        Ok(resp.message)
    }

    // ── Bracket pairings ───────────────────────────────────────────────

    pub async fn save_matchups(
        &self,
        tournament_id: &str,
        stage: Stage,
        matchups: &[[String; 2]],
    ) -> Result<(), ApiError> {
        let body = json!({
            "tournament_id": tournament_id,
            "round": stage.as_str(),
            "matchups": matchups,
        });
        let _: Value = self
            .send(
                self.http.post(self.url("/tournament/matchups")).json(&body),
                "save matchups",
            )
            .await?;
        Ok(())
    }

    pub async fn get_matchups(&self, tournament_id: &str, stage: Stage) -> Result<Vec<Vec<String>>, ApiError> {
        let resp: MatchupsResponse = self
            .send(
                self.http
                    .get(self.url("/tournament/matchups"))
                    .query(&[("tournament_id", tournament_id), ("round", stage.as_str())]),
                "get matchups",
            )
            .await?;
        Ok(resp.matchups)
    }

    // ── Matches ────────────────────────────────────────────────────────

    pub async fn list_matches(&self, tournament_id: &str) -> Result<Vec<Match>, ApiError> {
        let list: MatchList = self
            .send(
                self.http
                    .get(self.url("/matches"))
                    .query(&[("tournament_id", tournament_id)]),
                "list matches",
            )
            .await?;
        Ok(match list {
            MatchList::Bare(matches) | MatchList::Wrapped { matches } => matches,
        })
    }

    pub async fn get_match(&self, tournament_id: &str, match_id: MatchId) -> Result<Match, ApiError> {
        self.send(
            self.http
                .get(self.url(&format!("/matches/{match_id}")))
                .query(&[("tournament_id", tournament_id)]),
            "get match",
        )
        .await
    }

    pub async fn update_phase(
        &self,
        tournament_id: &str,
        match_id: MatchId,
        phase: MatchPhase,
        current_round: RoundNumber,
    ) -> Result<PhaseResponse, ApiError> {
        let body = PhaseUpdate {
            phase: phase.as_str(),
            current_round,
        };
        let resp: Option<PhaseResponse> = self
            .send(
                self.http
                    .patch(self.url(&format!("/matches/{match_id}/phase")))
                    .query(&[("tournament_id", tournament_id)])
                    .json(&body),
                "update phase",
            )
            .await?;
        Ok(resp.unwrap_or_default())
    }

    pub async fn update_results(
        &self,
        tournament_id: &str,
        match_id: MatchId,
        results: &MatchResults,
    ) -> Result<(), ApiError> {
        let body = json!({ "results": results });
        let _: Value = self
            .send(
                self.http
                    .patch(self.url(&format!("/matches/{match_id}/results")))
                    .query(&[("tournament_id", tournament_id)])
                    .json(&body),
                "update results",
            )
            .await?;
        Ok(())
    }

    pub async fn finalize_match(&self, tournament_id: &str, match_id: MatchId) -> Result<FinalizeResponse, ApiError> {
        let resp: Option<FinalizeResponse> = self
            .send(
                self.http
                    .post(self.url(&format!("/matches/{match_id}/finalize")))
                    .query(&[("tournament_id", tournament_id)]),
                "finalize match",
            )
            .await?;
        Ok(resp.unwrap_or_default())
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
