//! Integration tests for roster entry, login routing and dashboard standings.

use prompt_wars_console::logic::auth::{landing_path, route_guard, validate_login};
use prompt_wars_console::logic::{
    find_team_match, match_counts, normalize_roster, parse_roster_csv, recent_results, standings,
};
use prompt_wars_console::models::TeamRef;
use prompt_wars_console::{Match, MatchStatus, SessionUser, Stage, Team, TournamentError, UserRole};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn roster_needs_exactly_eight() {
    assert!(matches!(
        normalize_roster(&names(&["a", "b"])),
        Err(TournamentError::WrongNumberOfTeams { needed: 8, got: 2 })
    ));
}

#[test]
fn roster_fills_blanks_and_trims() {
    let roster = normalize_roster(&names(&[" Red ", "", "Blue", "Green", "", "Gold", "Iron", "Jade"])).unwrap();
    assert_eq!(roster[0], "Red");
    assert_eq!(roster[1], "Team 2");
    assert_eq!(roster[4], "Team 5");
}

#[test]
fn roster_rejects_duplicates_ignoring_case() {
    assert!(matches!(
        normalize_roster(&names(&["Red", "red", "c", "d", "e", "f", "g", "h"])),
        Err(TournamentError::DuplicateTeamName(n)) if n == "red"
    ));
}

#[test]
fn csv_roster_skips_header() {
    let text = "team_name,captain\nRed,Ann\nBlue,Bo\n\nGreen,Cy\n";
    assert_eq!(parse_roster_csv(text).unwrap(), names(&["Red", "Blue", "Green"]));
    assert_eq!(parse_roster_csv("Red\nBlue").unwrap(), names(&["Red", "Blue"]));
    assert!(matches!(parse_roster_csv("name\n"), Err(TournamentError::InvalidRoster(_))));
}

#[test]
fn login_needs_both_fields() {
    assert!(validate_login("admin", "pw").is_ok());
    assert!(matches!(validate_login(" ", "pw"), Err(TournamentError::MissingCredentials)));
    assert!(matches!(validate_login("admin", ""), Err(TournamentError::MissingCredentials)));
}

fn user(role: UserRole) -> SessionUser {
    SessionUser {
        username: "u".to_string(),
        role,
        token: "t".to_string(),
        team_name: None,
    }
}

#[test]
fn routes_are_guarded_by_role() {
    let admin = user(UserRole::Admin);
    let team = user(UserRole::Team);

    assert_eq!(route_guard(None, "/"), None);
    assert_eq!(route_guard(None, "/arena"), Some("/"));
    assert_eq!(route_guard(None, "/admin/bracket"), Some("/"));

    assert_eq!(route_guard(Some(&admin), "/"), Some("/admin/dashboard"));
    assert_eq!(route_guard(Some(&admin), "/arena"), Some("/admin/dashboard"));
    assert_eq!(route_guard(Some(&admin), "/admin/matches"), None);

    assert_eq!(route_guard(Some(&team), "/"), Some("/arena"));
    assert_eq!(route_guard(Some(&team), "/admin/dashboard"), Some("/arena"));
    assert_eq!(route_guard(Some(&team), "/arena"), None);

    assert_eq!(landing_path(UserRole::Admin), "/admin/dashboard");
    assert_eq!(landing_path(UserRole::Team), "/arena");
}

#[test]
fn team_name_falls_back_to_username() {
    let mut u = user(UserRole::Team);
    assert_eq!(u.team(), "u");
    u.team_name = Some("Red".to_string());
    assert_eq!(u.team(), "Red");
    assert!(!u.is_admin());
}

fn played(id: u64, a: &Team, b: &Team, winner: &Team, stage: Stage) -> Match {
    let mut m = Match::new(id, Some(a.clone()), Some(b.clone()), stage);
    m.status = MatchStatus::Completed;
    m.winner = Some(TeamRef::Team(winner.clone()));
    m
}

#[test]
fn standings_count_wins_and_losses() {
    let red = Team::new(1, "Red");
    let blue = Team::new(2, "Blue");
    let green = Team::new(3, "Green");
    let gold = Team::new(4, "Gold");
    let teams = vec![red.clone(), blue.clone(), green.clone(), gold.clone()];
    let matches = vec![
        played(1, &red, &blue, &red, Stage::Semifinal),
        played(2, &green, &gold, &gold, Stage::Semifinal),
        played(3, &red, &gold, &red, Stage::Final),
    ];
    let table = standings(&teams, &matches);
    assert_eq!(table[0].team.name, "Red");
    assert_eq!((table[0].wins, table[0].losses), (2, 0));
    assert_eq!(table[1].team.name, "Gold");
    assert_eq!((table[1].wins, table[1].losses), (1, 1));
    assert_eq!(table[3].losses, 1);

    let recent = recent_results(&matches, 2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].match_id, 3);
    assert_eq!(recent[0].winner, "Red");
}

#[test]
fn counts_and_team_match_lookup() {
    let red = Team::new(1, "Red");
    let blue = Team::new(2, "Blue");
    let green = Team::new(3, "Green");
    let done = played(1, &red, &blue, &red, Stage::Quarterfinal);
    let mut live = Match::new(5, Some(red.clone()), Some(green.clone()), Stage::Semifinal);
    live.status = MatchStatus::InProgress;
    let matches = vec![done, live];

    let counts = match_counts(&matches);
    assert_eq!((counts.pending, counts.in_progress, counts.completed), (0, 1, 1));
    assert_eq!(find_team_match(&matches, "red").map(|m| m.id), Some(5));
    assert_eq!(find_team_match(&matches, "Blue").map(|m| m.id), Some(1));
    assert!(find_team_match(&matches, "Nobody").is_none());
}
