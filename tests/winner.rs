//! Integration tests for the winner rule and result summaries.

use prompt_wars_console::logic::winner::{determine_match_winner, MatchSummary, WinReason};
use prompt_wars_console::{determine_winner, Match, RoundResult, Stage, Team, TournamentError};

fn round(attacker: &str, defender: &str, found: bool, time: Option<u32>, prompt_len: u32) -> RoundResult {
    RoundResult {
        attacker: attacker.to_string(),
        defender: defender.to_string(),
        attacker_found_key: found,
        attacker_time: time,
        defender_prompt_length: prompt_len,
        secret_key: "KEY".to_string(),
    }
}

#[test]
fn both_found_faster_attacker_wins() {
    let r1 = round("Alpha", "Bravo", true, Some(90), 50);
    let r2 = round("Bravo", "Alpha", true, Some(120), 50);
    let v = determine_winner(&r1, &r2);
    assert_eq!(v.winner.as_deref(), Some("Alpha"));
    assert_eq!(v.reason, WinReason::FasterExtraction);

    let v = determine_winner(&round("Alpha", "Bravo", true, Some(200), 50), &r2);
    assert_eq!(v.winner.as_deref(), Some("Bravo"));
}

#[test]
fn only_one_found_that_attacker_wins() {
    let v = determine_winner(
        &round("Alpha", "Bravo", true, Some(250), 10),
        &round("Bravo", "Alpha", false, None, 500),
    );
    assert_eq!(v.winner.as_deref(), Some("Alpha"));
    assert_eq!(v.reason, WinReason::OnlyExtraction);

    let v = determine_winner(
        &round("Alpha", "Bravo", false, None, 10),
        &round("Bravo", "Alpha", true, Some(299), 500),
    );
    assert_eq!(v.winner.as_deref(), Some("Bravo"));
    assert_eq!(v.reason, WinReason::OnlyExtraction);
}

#[test]
fn neither_found_shorter_prompt_defender_wins() {
    let r1 = round("Alpha", "Bravo", false, None, 100);
    let r2 = round("Bravo", "Alpha", false, None, 150);
    let v = determine_winner(&r1, &r2);
    assert_eq!(v.winner.as_deref(), Some("Bravo"));
    assert_eq!(v.reason, WinReason::ShorterPrompt);
}

#[test]
fn every_found_combination_has_a_verdict() {
    for (f1, f2) in [(true, true), (true, false), (false, true), (false, false)] {
        let r1 = round("Alpha", "Bravo", f1, f1.then_some(60), 80);
        let r2 = round("Bravo", "Alpha", f2, f2.then_some(100), 120);
        let v = determine_winner(&r1, &r2);
        assert!(v.winner.is_some(), "no winner for {f1} / {f2}");
    }
}

#[test]
fn equal_times_fall_back_to_prompt_length() {
    let r1 = round("Alpha", "Bravo", true, Some(100), 300);
    let r2 = round("Bravo", "Alpha", true, Some(100), 200);
    let v = determine_winner(&r1, &r2);
    assert_eq!(v.winner.as_deref(), Some("Alpha"));
    assert_eq!(v.reason, WinReason::ShorterPrompt);
}

#[test]
fn dead_even_is_a_draw() {
    let v = determine_winner(
        &round("Alpha", "Bravo", false, None, 120),
        &round("Bravo", "Alpha", false, None, 120),
    );
    assert_eq!(v.winner, None);
    assert_eq!(v.reason, WinReason::Draw);
}

#[test]
fn found_key_without_time_ranks_last() {
    let v = determine_winner(
        &round("Alpha", "Bravo", true, None, 10),
        &round("Bravo", "Alpha", true, Some(299), 10),
    );
    assert_eq!(v.winner.as_deref(), Some("Bravo"));
}

#[test]
fn match_winner_needs_both_rounds() {
    let mut m = Match::new(1, Some(Team::new(1, "Alpha")), Some(Team::new(2, "Bravo")), Stage::Final);
    m.results.round1 = Some(round("Alpha", "Bravo", true, Some(30), 40));
    assert!(matches!(
        determine_match_winner(&m),
        Err(TournamentError::IncompleteResults)
    ));
    m.results.round2 = Some(round("Bravo", "Alpha", false, None, 40));
    assert_eq!(determine_match_winner(&m).unwrap().winner.as_deref(), Some("Alpha"));
}

#[test]
fn summary_shows_times_and_prompt_lengths() {
    let mut m = Match::new(1, Some(Team::new(1, "Alpha")), Some(Team::new(2, "Bravo")), Stage::Final);
    m.results.round1 = Some(round("Alpha", "Bravo", true, Some(75), 40));
    m.results.round2 = Some(round("Bravo", "Alpha", false, None, 64));
    let verdict = determine_match_winner(&m).unwrap();
    let s = MatchSummary::build(&m, Some(&verdict));
    assert_eq!(s.team_a.time_display, "01:15");
    assert_eq!(s.team_a.system_prompt_length, Some(64));
    assert_eq!(s.team_b.time_display, "Failed");
    assert_eq!(s.team_b.system_prompt_length, Some(40));
    assert_eq!(s.winner.as_deref(), Some("Alpha"));
    assert_eq!(s.reason, Some(WinReason::OnlyExtraction));
}
