//! Team roster entry: the 8 names registered before the bracket is drawn.

use crate::logic::bracket::BRACKET_SIZE;
use crate::models::TournamentError;
use std::collections::HashSet;

const HEADER_NAMES: [&str; 3] = ["name", "team", "team_name"];

/// Exactly 8 names; blank entries become `Team N`, duplicates (case-insensitive) are rejected.
pub fn normalize_roster(names: &[String]) -> Result<Vec<String>, TournamentError> {
    if names.len() != BRACKET_SIZE {
        return Err(TournamentError::WrongNumberOfTeams {
            needed: BRACKET_SIZE,
            got: names.len(),
        });
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for (i, raw) in names.iter().enumerate() {
        let trimmed = raw.trim();
        let name = if trimmed.is_empty() {
            format!("Team {}", i + 1)
        } else {
            trimmed.to_string()
        };
        if !seen.insert(name.to_lowercase()) {
            return Err(TournamentError::DuplicateTeamName(name));
        }
        out.push(name);
    }
    Ok(out)
}

/// Team names from the first column of a CSV upload. A `name`/`team`/`team_name` header row is skipped.
pub fn parse_roster_csv(text: &str) -> Result<Vec<String>, TournamentError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut names = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| TournamentError::InvalidRoster(e.to_string()))?;
        let first = record.get(0).unwrap_or("").to_string();
        if i == 0 && HEADER_NAMES.iter().any(|h| first.eq_ignore_ascii_case(h)) {
            continue;
        }
        if first.is_empty() && record.iter().all(str::is_empty) {
            continue;
        }
        names.push(first);
    }
    if names.is_empty() {
        return Err(TournamentError::InvalidRoster("no team names found".to_string()));
    }
    Ok(names)
}
