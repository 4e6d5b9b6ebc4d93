//! Single binary web server: console page from templates/, static from /static, API via REST.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default and talks to the Prompt Wars backend at BACKEND_URL.
//! Env: HOST, PORT, BACKEND_URL, SESSION_SECRET, POLL_INTERVAL_SECS, INACTIVITY_HOURS, STATIC_DIR.

use actix_files::Files;
use actix_session::{storage::CookieSessionStore, Session, SessionGetError, SessionInsertError, SessionMiddleware};
use actix_web::{
    cookie::Key,
    get,
    http::{header, StatusCode},
    post, put,
    web::{self, Data, Json, Path},
    App, HttpRequest, HttpResponse, HttpServer, Responder, ResponseError,
};
use chrono::Utc;
use prompt_wars_console::client::ApiError;
use prompt_wars_console::logic::auth::{landing_path, route_guard, validate_login};
use prompt_wars_console::logic::chat::{ChatTranscript, MonitorReport};
use prompt_wars_console::logic::{
    advance_as_team, advance_match, auto_matchups, due_expiry, find_team_match, match_counts,
    normalize_roster, parse_roster_csv, recent_results, standings, validate_manual, ArenaView,
    Bracket, ControlView, DefenderSetup, MatchSummary, PhaseAction, PhaseState,
};
use prompt_wars_console::models::{
    Match, MatchId, MatchPhase, Role, RoundNumber, SessionUser, Stage, TeamId, TournamentError,
    TournamentId, UserRole,
};
use prompt_wars_console::sync::MatchBoard;
use prompt_wars_console::{BackendClient, Config};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

const USER_KEY: &str = "user";
const TOURNAMENT_KEY: &str = "tournament_id";

/// Per-tournament entry: bracket, polled matches, chat transcripts, last activity (for auto-cleanup).
struct TournamentEntry {
    bracket: Bracket,
    board: MatchBoard,
    /// Attack-phase transcripts by (match, round).
    chats: HashMap<(MatchId, RoundNumber), ChatTranscript>,
    /// Most recent backend token seen for this tournament; the poller uses it.
    token: Option<String>,
    last_activity: Instant,
}

impl TournamentEntry {
    fn new() -> Self {
        Self {
            bracket: Bracket::new(),
            board: MatchBoard::new(),
            chats: HashMap::new(),
            token: None,
            last_activity: Instant::now(),
        }
    }
}

/// In-memory state: console data per tournament id. Entries are removed after inactivity.
type AppState = Data<RwLock<HashMap<TournamentId, TournamentEntry>>>;

/// Who is driving a phase action.
#[derive(Clone, Debug)]
enum Actor {
    Admin,
    Team(String),
    /// Poller expiring an overdue timer.
    System,
}

#[derive(Debug)]
enum WebError {
    Domain(TournamentError),
    Backend(ApiError),
    NotLoggedIn,
    Forbidden(&'static str),
    NoTournament,
    Session(String),
    Lock,
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::Domain(e) => write!(f, "{}", e),
            WebError::Backend(e) => write!(f, "{}", e.message()),
            WebError::NotLoggedIn => write!(f, "Not logged in"),
            WebError::Forbidden(what) => write!(f, "{} only", what),
            WebError::NoTournament => write!(f, "No tournament selected"),
            WebError::Session(e) => write!(f, "Session error: {}", e),
            WebError::Lock => write!(f, "lock error"),
        }
    }
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            WebError::Domain(e) => match e {
                TournamentError::MatchNotFound(_)
                | TournamentError::TeamNotFound(_)
                | TournamentError::NoActiveMatch(_) => StatusCode::NOT_FOUND,
                TournamentError::WrongRole { .. } | TournamentError::AdminOnly(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
            WebError::Backend(e) => match e {
                ApiError::Status { status: 401, .. } => StatusCode::UNAUTHORIZED,
                ApiError::Status { status: 403, .. } => StatusCode::FORBIDDEN,
                ApiError::Status { status: 404, .. } => StatusCode::NOT_FOUND,
                ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            },
            WebError::NotLoggedIn => StatusCode::UNAUTHORIZED,
            WebError::Forbidden(_) => StatusCode::FORBIDDEN,
            WebError::NoTournament => StatusCode::BAD_REQUEST,
            WebError::Session(_) | WebError::Lock => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<TournamentError> for WebError {
    fn from(e: TournamentError) -> Self {
        WebError::Domain(e)
    }
}

impl From<ApiError> for WebError {
    fn from(e: ApiError) -> Self {
        WebError::Backend(e)
    }
}

impl From<SessionGetError> for WebError {
    fn from(e: SessionGetError) -> Self {
        WebError::Session(e.to_string())
    }
}

impl From<SessionInsertError> for WebError {
    fn from(e: SessionInsertError) -> Self {
        WebError::Session(e.to_string())
    }
}

type WebResult = Result<HttpResponse, WebError>;

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
    role: UserRole,
    #[serde(default)]
    tournament_id: Option<TournamentId>,
}

#[derive(Deserialize)]
struct SelectTournamentBody {
    tournament_id: TournamentId,
}

#[derive(Deserialize)]
struct RegisterTeamsBody {
    team_names: Vec<String>,
}

#[derive(Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum SeedBody {
    Auto,
    Manual { pairs: Vec<(TeamId, TeamId)> },
}

#[derive(Deserialize)]
struct BracketWinnerBody {
    stage: Stage,
    match_id: MatchId,
    team_id: TeamId,
}

#[derive(Deserialize)]
struct BracketMatchBody {
    stage: Stage,
    match_id: MatchId,
}

#[derive(Deserialize)]
struct ActionBody {
    action: PhaseAction,
    #[serde(default)]
    secret_key: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
}

impl ActionBody {
    fn setup(&self) -> Option<DefenderSetup> {
        match (&self.secret_key, &self.system_prompt) {
            (Some(secret_key), Some(system_prompt)) => Some(DefenderSetup {
                secret_key: secret_key.clone(),
                system_prompt: system_prompt.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ChatBody {
    message: String,
}

#[derive(Deserialize)]
struct FlagBody {
    message_id: Uuid,
}

/// Path segment: match id (e.g. /api/admin/matches/{id})
#[derive(Deserialize)]
struct MatchPath {
    id: MatchId,
}

// ── Session helpers ────────────────────────────────────────────────────

fn session_user(session: &Session) -> Result<SessionUser, WebError> {
    session.get::<SessionUser>(USER_KEY)?.ok_or(WebError::NotLoggedIn)
}

fn require_admin(session: &Session) -> Result<SessionUser, WebError> {
    let user = session_user(session)?;
    if !user.is_admin() {
        return Err(WebError::Forbidden("Admin"));
    }
    Ok(user)
}

fn require_team(session: &Session) -> Result<SessionUser, WebError> {
    let user = session_user(session)?;
    if user.is_admin() {
        return Err(WebError::Forbidden("Team"));
    }
    Ok(user)
}

fn session_tournament(session: &Session) -> Result<TournamentId, WebError> {
    session
        .get::<TournamentId>(TOURNAMENT_KEY)?
        .filter(|id| !id.trim().is_empty())
        .ok_or(WebError::NoTournament)
}

/// Run `f` on the tournament's entry (created on first use), refreshing last_activity.
fn with_entry<T>(
    state: &AppState,
    tournament_id: &str,
    token: Option<&str>,
    f: impl FnOnce(&mut TournamentEntry) -> Result<T, WebError>,
) -> Result<T, WebError> {
    let mut g = state.write().map_err(|_| WebError::Lock)?;
    let entry = g
        .entry(tournament_id.to_string())
        .or_insert_with(TournamentEntry::new);
    entry.last_activity = Instant::now();
    if let Some(token) = token {
        entry.token = Some(token.to_string());
    }
    f(entry)
}

/// Fetch the tournament's matches into its board. A failed fetch keeps the old snapshot
/// and is still reported to the caller.
async fn refresh_board(
    state: &AppState,
    backend: &BackendClient,
    tournament_id: &str,
) -> Result<Vec<Match>, WebError> {
    let result = backend.list_matches(tournament_id).await;
    let failure = result.as_ref().err().cloned();
    let matches = with_entry(state, tournament_id, None, |entry| {
        entry.board.apply(result, Utc::now());
        Ok(entry.board.matches.clone())
    })?;
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(matches),
    }
}

// ── Shared phase pipeline (admin control panel, arena, poller) ─────────

/// Apply one phase action to a match and mirror it to the backend.
///
/// The backend copy is fetched first; results are saved before the phase so a
/// round never shows complete without its outcome. Finalizing also advances the
/// winner in the console bracket.
async fn run_action(
    state: &AppState,
    backend: &BackendClient,
    tournament_id: &str,
    match_id: MatchId,
    actor: Actor,
    action: PhaseAction,
    setup: Option<&DefenderSetup>,
) -> Result<Match, WebError> {
    let mut m = backend.get_match(tournament_id, match_id).await?;
    with_entry(state, tournament_id, None, |entry| {
        entry.board.restore_phase_start(&mut m);
        Ok(())
    })?;
    let now = Utc::now();
    let update = match &actor {
        Actor::Team(team) => advance_as_team(&mut m, team, action, setup, now)?,
        Actor::Admin => advance_match(&mut m, action, setup, now)?,
        Actor::System if action == PhaseAction::Expire => advance_match(&mut m, action, None, now)?,
        Actor::System => return Err(TournamentError::AdminOnly(action.as_str()).into()),
    };

    if update.results_changed {
        backend
            .update_results(tournament_id, match_id, &m.results)
            .await?;
    }
    let phase = backend
        .update_phase(tournament_id, match_id, m.current_phase, m.current_round)
        .await?;
    if let Some(started) = phase.phase_start_time {
        m.phase_start_time = Some(started);
    }

    let mut next_pairings = None;
    if m.current_phase == MatchPhase::MatchComplete {
        let finalized = backend.finalize_match(tournament_id, match_id).await?;
        if let Some(winner) = finalized.winner {
            if m.winner_name() != Some(winner.name()) {
                log::info!(
                    "match {}: backend decided {} (console computed {:?})",
                    match_id,
                    winner.name(),
                    m.winner_name()
                );
            }
            m.winner = Some(winner);
        }
        next_pairings = with_entry(state, tournament_id, None, |entry| {
            match entry.bracket.advance_from_match(&m) {
                Ok(Some(adv)) => Ok(entry.bracket.pairings(adv.stage).map(|p| (adv.stage, p))),
                Ok(None) => Ok(None),
                Err(e) => {
                    log::warn!("match {}: bracket not updated: {}", match_id, e);
                    Ok(None)
                }
            }
        })?;
    }
    if let Some((stage, pairs)) = next_pairings {
        backend.save_matchups(tournament_id, stage, &pairs).await?;
    }

    let round = m.current_round;
    let snapshot = m.clone();
    with_entry(state, tournament_id, None, |entry| {
        match snapshot.current_phase {
            MatchPhase::AttackerChat => {
                entry
                    .chats
                    .entry((match_id, round))
                    .or_insert_with(|| ChatTranscript::new(now));
            }
            MatchPhase::RoundComplete | MatchPhase::MatchComplete => {
                if let Some(chat) = entry.chats.get_mut(&(match_id, update.transition.round)) {
                    chat.close();
                }
            }
            _ => {}
        }
        entry.board.upsert(snapshot);
        Ok(())
    })?;
    Ok(m)
}

// ── Pages ──────────────────────────────────────────────────────────────

/// Console page for "/", "/admin/*" and "/arena", redirecting by role first.
async fn serve_page(req: HttpRequest, session: Session) -> HttpResponse {
    let user = session.get::<SessionUser>(USER_KEY).ok().flatten();
    if let Some(to) = route_guard(user.as_ref(), req.path()) {
        return HttpResponse::Found()
            .insert_header((header::LOCATION, to))
            .finish();
    }
    let html = include_str!("../../templates/index.html");
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "prompt-wars-console",
    })
}

/// Avoid 404 in browser tab: favicon not required for app logic.
#[get("/favicon.ico")]
async fn favicon() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

// ── Auth ───────────────────────────────────────────────────────────────

#[post("/api/auth/login")]
async fn api_login(backend: Data<BackendClient>, session: Session, body: Json<LoginBody>) -> WebResult {
    validate_login(&body.username, &body.password)?;
    let resp = backend
        .login(body.username.trim(), &body.password, body.role)
        .await?;
    let team_name = match resp.role {
        UserRole::Team => resp.team_name.or_else(|| Some(body.username.trim().to_string())),
        UserRole::Admin => None,
    };
    let user = SessionUser {
        username: body.username.trim().to_string(),
        role: resp.role,
        token: resp.token,
        team_name,
    };
    session.renew();
    session.insert(USER_KEY, &user)?;
    if let Some(id) = body.tournament_id.as_deref().filter(|id| !id.trim().is_empty()) {
        session.insert(TOURNAMENT_KEY, id.trim())?;
    }
    log::info!("{} logged in as {:?}", user.username, user.role);
    Ok(HttpResponse::Ok().json(json!({
        "username": user.username,
        "role": user.role,
        "team_name": user.team_name,
        "redirect": landing_path(user.role),
    })))
}

#[post("/api/auth/logout")]
async fn api_logout(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(json!({ "redirect": "/" }))
}

#[get("/api/auth/me")]
async fn api_me(session: Session) -> WebResult {
    let user = session_user(&session)?;
    let tournament_id = session.get::<TournamentId>(TOURNAMENT_KEY)?;
    Ok(HttpResponse::Ok().json(json!({
        "username": user.username,
        "role": user.role,
        "team_name": user.team_name,
        "tournament_id": tournament_id,
    })))
}

/// Choose the tournament this browser works on (replaces the stored tournament id).
#[put("/api/tournament")]
async fn api_select_tournament(
    state: AppState,
    session: Session,
    body: Json<SelectTournamentBody>,
) -> WebResult {
    let user = session_user(&session)?;
    let id = body.tournament_id.trim();
    if id.is_empty() {
        return Err(WebError::NoTournament);
    }
    session.insert(TOURNAMENT_KEY, id)?;
    with_entry(&state, id, Some(&user.token), |_| Ok(()))?;
    Ok(HttpResponse::Ok().json(json!({ "tournament_id": id })))
}

// ── Admin: teams and tournament ────────────────────────────────────────

async fn register_roster(
    state: &AppState,
    backend: &BackendClient,
    session: &Session,
    user: &SessionUser,
    names: &[String],
) -> WebResult {
    let roster = normalize_roster(names)?;
    let resp = backend
        .with_token(&user.token)
        .register_teams_bulk(&roster)
        .await?;
    session.insert(TOURNAMENT_KEY, &resp.tournament_id)?;
    with_entry(state, &resp.tournament_id, Some(&user.token), |entry| {
        entry.bracket.reset();
        entry.board.clear();
        entry.chats.clear();
        Ok(())
    })?;
    log::info!("registered {} teams for tournament {}", roster.len(), resp.tournament_id);
    Ok(HttpResponse::Ok().json(json!({
        "tournament_id": resp.tournament_id,
        "message": resp.message,
        "teams": roster,
    })))
}

#[post("/api/admin/teams")]
async fn api_register_teams(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: Json<RegisterTeamsBody>,
) -> WebResult {
    let user = require_admin(&session)?;
    register_roster(&state, &backend, &session, &user, &body.team_names).await
}

/// Same as /api/admin/teams with a CSV body (first column = team name).
#[post("/api/admin/teams/csv")]
async fn api_register_teams_csv(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: String,
) -> WebResult {
    let user = require_admin(&session)?;
    let names = parse_roster_csv(&body)?;
    register_roster(&state, &backend, &session, &user, &names).await
}

#[get("/api/admin/teams")]
async fn api_list_teams(backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let teams = backend.with_token(&user.token).list_teams(&tid).await?;
    Ok(HttpResponse::Ok().json(teams))
}

#[post("/api/admin/reset")]
async fn api_reset_tournament(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let message = backend.with_token(&user.token).reset_tournament(&tid).await?;
    with_entry(&state, &tid, Some(&user.token), |entry| {
        entry.bracket.reset();
        entry.board.clear();
        entry.chats.clear();
        Ok(())
    })?;
    log::info!("tournament {} reset", tid);
    Ok(HttpResponse::Ok().json(json!({ "message": message })))
}

#[get("/api/admin/dashboard")]
async fn api_dashboard(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let backend = backend.with_token(&user.token);
    let teams = backend.list_teams(&tid).await?;
    let matches = refresh_board(&state, &backend, &tid).await?;
    let (champion, last_error) = with_entry(&state, &tid, Some(&user.token), |entry| {
        Ok((entry.bracket.champion().cloned(), entry.board.last_error.clone()))
    })?;
    Ok(HttpResponse::Ok().json(json!({
        "tournament_id": tid,
        "team_count": teams.len(),
        "standings": standings(&teams, &matches),
        "recent_results": recent_results(&matches, 5),
        "match_counts": match_counts(&matches),
        "champion": champion,
        "last_error": last_error,
    })))
}

// ── Admin: bracket ─────────────────────────────────────────────────────

fn bracket_json(bracket: &Bracket) -> serde_json::Value {
    json!({
        "bracket": bracket,
        "champion": bracket.champion(),
        "played": bracket.played_count(),
    })
}

#[get("/api/admin/bracket")]
async fn api_get_bracket(state: AppState, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let body = with_entry(&state, &tid, Some(&user.token), |entry| Ok(bracket_json(&entry.bracket)))?;
    Ok(HttpResponse::Ok().json(body))
}

/// Rebuild the bracket from the pairings saved on the backend.
#[post("/api/admin/bracket/load")]
async fn api_load_bracket(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let backend = backend.with_token(&user.token);
    let teams = backend.list_teams(&tid).await?;
    let mut stages = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        stages.push((stage, backend.get_matchups(&tid, stage).await?));
    }
    let matches = refresh_board(&state, &backend, &tid).await?;
    let body = with_entry(&state, &tid, Some(&user.token), |entry| {
        let mut bracket = Bracket::new();
        for (stage, pairs) in &stages {
            bracket.load_stage(*stage, pairs, &teams)?;
        }
        for m in matches.iter().filter(|m| m.winner.is_some()) {
            if let Err(e) = bracket.advance_from_match(m) {
                log::debug!("match {} not placed in bracket: {}", m.id, e);
            }
        }
        entry.bracket = bracket;
        Ok(bracket_json(&entry.bracket))
    })?;
    Ok(HttpResponse::Ok().json(body))
}

#[post("/api/admin/bracket/seed")]
async fn api_seed_bracket(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: Json<SeedBody>,
) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let backend = backend.with_token(&user.token);
    let teams = backend.list_teams(&tid).await?;
    let matchups = match body.into_inner() {
        SeedBody::Auto => auto_matchups(&teams, &mut rand::thread_rng())?,
        SeedBody::Manual { pairs } => validate_manual(&teams, &pairs)?,
    };
    let pairs = with_entry(&state, &tid, Some(&user.token), |entry| {
        entry.bracket.seed(&matchups)?;
        Ok(entry.bracket.pairings(Stage::Quarterfinal))
    })?;
    if let Some(pairs) = pairs {
        backend.save_matchups(&tid, Stage::Quarterfinal, &pairs).await?;
    }
    let body = with_entry(&state, &tid, None, |entry| Ok(bracket_json(&entry.bracket)))?;
    Ok(HttpResponse::Ok().json(body))
}

/// Pick a winner by hand; a completed next stage is synced to the backend.
#[post("/api/admin/bracket/winner")]
async fn api_bracket_winner(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: Json<BracketWinnerBody>,
) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let (advancement, pairs, snapshot) = with_entry(&state, &tid, Some(&user.token), |entry| {
        let adv = entry
            .bracket
            .select_winner(body.stage, body.match_id, body.team_id)?;
        let pairs = adv
            .as_ref()
            .and_then(|a| entry.bracket.pairings(a.stage).map(|p| (a.stage, p)));
        Ok((adv, pairs, bracket_json(&entry.bracket)))
    })?;
    if let Some((stage, pairs)) = pairs {
        backend
            .with_token(&user.token)
            .save_matchups(&tid, stage, &pairs)
            .await?;
    }
    Ok(HttpResponse::Ok().json(json!({ "advancement": advancement, "bracket": snapshot })))
}

#[post("/api/admin/bracket/in-progress")]
async fn api_bracket_in_progress(state: AppState, session: Session, body: Json<BracketMatchBody>) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let snapshot = with_entry(&state, &tid, Some(&user.token), |entry| {
        entry.bracket.set_in_progress(body.stage, body.match_id)?;
        Ok(bracket_json(&entry.bracket))
    })?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[post("/api/admin/bracket/reset")]
async fn api_bracket_reset(state: AppState, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let snapshot = with_entry(&state, &tid, Some(&user.token), |entry| {
        entry.bracket.reset();
        Ok(bracket_json(&entry.bracket))
    })?;
    Ok(HttpResponse::Ok().json(snapshot))
}

// ── Admin: matches and control panel ───────────────────────────────────

#[get("/api/admin/matches")]
async fn api_list_matches(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let matches = refresh_board(&state, &backend.with_token(&user.token), &tid).await?;
    let (fetched_at, last_error) = with_entry(&state, &tid, Some(&user.token), |entry| {
        Ok((entry.board.fetched_at, entry.board.last_error.clone()))
    })?;
    Ok(HttpResponse::Ok().json(json!({
        "matches": matches,
        "fetched_at": fetched_at,
        "last_error": last_error,
    })))
}

fn control_json(m: &Match) -> serde_json::Value {
    let summary = (m.current_phase == MatchPhase::MatchComplete)
        .then(|| MatchSummary::build(m, None));
    json!({
        "control": ControlView::build(m, Utc::now()),
        "summary": summary,
    })
}

#[get("/api/admin/matches/{id}")]
async fn api_match_control(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    path: Path<MatchPath>,
) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let mut m = backend.with_token(&user.token).get_match(&tid, path.id).await?;
    with_entry(&state, &tid, Some(&user.token), |entry| {
        entry.board.restore_phase_start(&mut m);
        entry.board.upsert(m.clone());
        Ok(())
    })?;
    let body = control_json(&m);
    Ok(HttpResponse::Ok().json(body))
}

/// Drive a match from the control panel (start round, force lock-in, end attack, swap, finalize).
#[post("/api/admin/matches/{id}/actions")]
async fn api_match_action(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    path: Path<MatchPath>,
    body: Json<ActionBody>,
) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let setup = body.setup();
    let m = run_action(
        &state,
        &backend.with_token(&user.token),
        &tid,
        path.id,
        Actor::Admin,
        body.action,
        setup.as_ref(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(control_json(&m)))
}

#[get("/api/admin/matches/{id}/monitor")]
async fn api_monitor(state: AppState, session: Session, path: Path<MatchPath>) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let body = with_entry(&state, &tid, Some(&user.token), |entry| {
        let m = entry
            .board
            .find(path.id)
            .ok_or(TournamentError::MatchNotFound(path.id))?;
        let round = m.current_round;
        let secret = m
            .round_result(round)
            .map(|r| r.secret_key.clone())
            .unwrap_or_default();
        let transcript = entry.chats.get(&(path.id, round));
        let report = transcript.map(|t| MonitorReport::scan(t, &secret));
        Ok(json!({
            "match_id": path.id,
            "round": round,
            "attacker": m.attacker(round),
            "defender": m.defender(round),
            "messages": transcript.map(|t| t.messages.clone()).unwrap_or_default(),
            "report": report,
        }))
    })?;
    Ok(HttpResponse::Ok().json(body))
}

#[post("/api/admin/matches/{id}/monitor/flag")]
async fn api_monitor_flag(
    state: AppState,
    session: Session,
    path: Path<MatchPath>,
    body: Json<FlagBody>,
) -> WebResult {
    let user = require_admin(&session)?;
    let tid = session_tournament(&session)?;
    let flagged = with_entry(&state, &tid, Some(&user.token), |entry| {
        let round = entry
            .board
            .find(path.id)
            .map(|m| m.current_round)
            .ok_or(TournamentError::MatchNotFound(path.id))?;
        Ok(entry
            .chats
            .get_mut(&(path.id, round))
            .is_some_and(|t| t.flag(body.message_id)))
    })?;
    if !flagged {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "No such message" })));
    }
    Ok(HttpResponse::Ok().json(json!({ "flagged": body.message_id })))
}

// ── Arena ──────────────────────────────────────────────────────────────

/// The team's current match, fresh from the backend.
async fn team_match(
    state: &AppState,
    backend: &BackendClient,
    tid: &str,
    team: &str,
) -> Result<Match, WebError> {
    let matches = refresh_board(state, backend, tid).await?;
    find_team_match(&matches, team)
        .cloned()
        .ok_or_else(|| TournamentError::NoActiveMatch(team.to_string()).into())
}

fn arena_json(state: &AppState, tid: &str, m: &Match, team: &str) -> Result<serde_json::Value, WebError> {
    let now = Utc::now();
    let view = ArenaView::for_team(m, team, now)?;
    let chat = with_entry(state, tid, None, |entry| {
        if view.role != Role::Attacker {
            return Ok(None);
        }
        let key = (m.id, m.current_round);
        if m.current_phase == MatchPhase::AttackerChat {
            let transcript = entry
                .chats
                .entry(key)
                .or_insert_with(|| ChatTranscript::new(now));
            return Ok(Some(transcript.messages.clone()));
        }
        Ok(entry.chats.get(&key).map(|t| t.messages.clone()))
    })?;
    let summary = (m.current_phase == MatchPhase::MatchComplete).then(|| MatchSummary::build(m, None));
    Ok(json!({ "arena": view, "chat": chat, "summary": summary }))
}

#[get("/api/arena")]
async fn api_arena(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    let user = require_team(&session)?;
    let tid = session_tournament(&session)?;
    with_entry(&state, &tid, Some(&user.token), |_| Ok(()))?;
    let m = team_match(&state, &backend.with_token(&user.token), &tid, user.team()).await?;
    Ok(HttpResponse::Ok().json(arena_json(&state, &tid, &m, user.team())?))
}

async fn arena_action(
    state: &AppState,
    backend: &BackendClient,
    session: &Session,
    action: PhaseAction,
    setup: Option<&DefenderSetup>,
) -> WebResult {
    let user = require_team(session)?;
    let tid = session_tournament(session)?;
    let backend = backend.with_token(&user.token);
    let current = team_match(state, &backend, &tid, user.team()).await?;
    let m = run_action(
        state,
        &backend,
        &tid,
        current.id,
        Actor::Team(user.team().to_string()),
        action,
        setup,
    )
    .await?;
    Ok(HttpResponse::Ok().json(arena_json(state, &tid, &m, user.team())?))
}

#[post("/api/arena/start")]
async fn api_arena_start(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    arena_action(&state, &backend, &session, PhaseAction::StartRound, None).await
}

#[post("/api/arena/lock-in")]
async fn api_arena_lock_in(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: Json<DefenderSetup>,
) -> WebResult {
    arena_action(&state, &backend, &session, PhaseAction::LockIn, Some(&*body)).await
}

/// Countdown hit zero on the client; rejected unless the phase really is overdue.
#[post("/api/arena/expire")]
async fn api_arena_expire(state: AppState, backend: Data<BackendClient>, session: Session) -> WebResult {
    arena_action(&state, &backend, &session, PhaseAction::Expire, None).await
}

/// Attacker message. Mentioning the secret key ends the round.
#[post("/api/arena/chat")]
async fn api_arena_chat(
    state: AppState,
    backend: Data<BackendClient>,
    session: Session,
    body: Json<ChatBody>,
) -> WebResult {
    let user = require_team(&session)?;
    let tid = session_tournament(&session)?;
    let backend = backend.with_token(&user.token);
    let m = team_match(&state, &backend, &tid, user.team()).await?;
    let round = m.current_round;
    if m.role_of(user.team(), round) != Some(Role::Attacker) {
        return Err(TournamentError::WrongRole {
            expected: Role::Attacker,
        }
        .into());
    }
    if m.current_phase != MatchPhase::AttackerChat {
        return Err(TournamentError::ChatClosed.into());
    }
    let secret = m
        .round_result(round)
        .map(|r| r.secret_key.clone())
        .unwrap_or_default();
    let now = Utc::now();
    let exchange = with_entry(&state, &tid, Some(&user.token), |entry| {
        let transcript = entry
            .chats
            .entry((m.id, round))
            .or_insert_with(|| ChatTranscript::new(now));
        Ok(transcript.submit(&body.message, &secret, now, &mut rand::thread_rng())?)
    })?;

    let m = if exchange.key_found {
        log::info!("match {}: {} extracted the key in round {}", m.id, user.team(), round);
        run_action(
            &state,
            &backend,
            &tid,
            m.id,
            Actor::Team(user.team().to_string()),
            PhaseAction::KeyFound,
            None,
        )
        .await?
    } else {
        m
    };
    let mut body = arena_json(&state, &tid, &m, user.team())?;
    body["exchange"] = json!(exchange);
    Ok(HttpResponse::Ok().json(body))
}

// ── Background tasks ───────────────────────────────────────────────────

/// Poll every active tournament, then expire any phase whose countdown ran out.
async fn poll_once(state: &AppState, backend: &BackendClient) {
    let targets: Vec<(TournamentId, Option<String>)> = match state.read() {
        Ok(g) => g.iter().map(|(id, e)| (id.clone(), e.token.clone())).collect(),
        Err(_) => return,
    };
    for (tid, token) in targets {
        let client = match &token {
            Some(token) => backend.with_token(token),
            None => backend.clone(),
        };
        let result = client.list_matches(&tid).await;
        let now = Utc::now();
        let overdue: Vec<MatchId> = match state.write() {
            Ok(mut g) => match g.get_mut(&tid) {
                Some(entry) => {
                    entry.board.apply(result, now);
                    entry
                        .board
                        .matches
                        .iter()
                        .filter(|m| due_expiry(&PhaseState::of(m), now).is_some())
                        .map(|m| m.id)
                        .collect()
                }
                None => continue,
            },
            Err(_) => return,
        };
        for match_id in overdue {
            match run_action(state, &client, &tid, match_id, Actor::System, PhaseAction::Expire, None).await {
                Ok(m) => log::info!("match {}: timer expired, now {}", match_id, m.current_phase),
                Err(e) => log::debug!("match {}: expiry skipped: {}", match_id, e),
            }
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let config = Config::from_env();
    let backend = BackendClient::new(&config.backend_url)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let key = Key::try_from(config.session_secret.as_slice())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let (host, port) = config.bind_addr();
    log::info!("Starting server at http://{}:{} (backend {})", host, port, backend.base_url());

    let state = Data::new(RwLock::new(HashMap::<TournamentId, TournamentEntry>::new()));
    let backend_data = Data::new(backend.clone());

    // Background task: keep match boards fresh and enforce phase timers
    let state_poll = state.clone();
    let poll_interval = config.poll_interval;
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(poll_interval);
        // A slow backend delays the next poll instead of bunching them up
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            poll_once(&state_poll, &backend).await;
        }
    });

    // Background task: every 30 minutes, remove tournaments with no console activity
    let state_cleanup = state.clone();
    let inactivity = config.inactivity_timeout;
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(30 * 60));
        loop {
            interval.tick().await;
            let mut g = match state_cleanup.write() {
                Ok(guard) => guard,
                Err(_) => continue,
            };
            let before = g.len();
            g.retain(|_, entry| entry.last_activity.elapsed() < inactivity);
            let removed = before - g.len();
            if removed > 0 {
                log::info!("Cleaned up {} inactive tournament(s)", removed);
            }
        }
    });

    let static_dir = config.static_dir.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
                    .cookie_name("prompt_wars".to_string())
                    .cookie_secure(false)
                    .build(),
            )
            .app_data(state.clone())
            .app_data(backend_data.clone())
            .route("/", web::get().to(serve_page))
            .route("/admin", web::get().to(serve_page))
            .route("/admin/{tail:.*}", web::get().to(serve_page))
            .route("/arena", web::get().to(serve_page))
            .service(api_health)
            .service(favicon)
            .service(api_login)
            .service(api_logout)
            .service(api_me)
            .service(api_select_tournament)
            .service(api_register_teams)
            .service(api_register_teams_csv)
            .service(api_list_teams)
            .service(api_reset_tournament)
            .service(api_dashboard)
            .service(api_get_bracket)
            .service(api_load_bracket)
            .service(api_seed_bracket)
            .service(api_bracket_winner)
            .service(api_bracket_in_progress)
            .service(api_bracket_reset)
            .service(api_list_matches)
            .service(api_match_control)
            .service(api_match_action)
            .service(api_monitor)
            .service(api_monitor_flag)
            .service(api_arena)
            .service(api_arena_start)
            .service(api_arena_lock_in)
            .service(api_arena_expire)
            .service(api_arena_chat)
            .service(Files::new("/static", static_dir.clone()))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
