//! Integration tests for the match phase state machine, as driven by the admin and the arena.

use chrono::{DateTime, Duration, TimeZone, Utc};
use prompt_wars_console::logic::phase::{due_expiry, progress_percent, transition};
use prompt_wars_console::logic::{DefenderSetup, PhaseState};
use prompt_wars_console::logic::winner::WinReason;
use prompt_wars_console::sync::MatchBoard;
use prompt_wars_console::{
    advance_as_team, advance_match, ArenaView, ControlView, Match, MatchPhase, MatchStatus,
    PhaseAction, Role, Stage, Team, TournamentError,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

fn new_match() -> Match {
    Match::new(
        1,
        Some(Team::new(1, "Alpha")),
        Some(Team::new(2, "Bravo")),
        Stage::Quarterfinal,
    )
}

fn setup(secret: &str, prompt: &str) -> DefenderSetup {
    DefenderSetup {
        secret_key: secret.to_string(),
        system_prompt: prompt.to_string(),
    }
}

#[test]
fn transition_follows_the_phase_order() {
    let now = t0();
    let mut state = PhaseState::new();
    let steps = [
        (PhaseAction::StartRound, MatchPhase::DefenderSetup, 1),
        (PhaseAction::LockIn, MatchPhase::AttackerChat, 1),
        (PhaseAction::KeyFound, MatchPhase::RoundComplete, 1),
        (PhaseAction::SwapRoles, MatchPhase::WaitingForDefender, 2),
        (PhaseAction::StartRound, MatchPhase::DefenderSetup, 2),
        (PhaseAction::Expire, MatchPhase::AttackerChat, 2),
        (PhaseAction::EndAttack, MatchPhase::RoundComplete, 2),
        (PhaseAction::Finalize, MatchPhase::MatchComplete, 2),
    ];
    for (action, to, round) in steps {
        let t = transition(&state, action, now).unwrap();
        assert_eq!((t.to, t.round), (to, round), "after {:?}", action);
        state.apply(&t);
    }
}

#[test]
fn timed_phases_start_their_countdowns() {
    let t = transition(&PhaseState::new(), PhaseAction::StartRound, t0()).unwrap();
    assert_eq!(t.countdown.map(|c| c.duration_secs), Some(180));
    let mut state = PhaseState::new();
    state.apply(&t);
    let t = transition(&state, PhaseAction::LockIn, t0()).unwrap();
    assert_eq!(t.countdown.map(|c| c.duration_secs), Some(300));
    state.apply(&t);
    let t = transition(&state, PhaseAction::EndAttack, t0()).unwrap();
    assert!(t.countdown.is_none());
    assert!(t.round_finished);
}

#[test]
fn out_of_order_actions_are_rejected() {
    let state = PhaseState::new();
    for action in [
        PhaseAction::LockIn,
        PhaseAction::KeyFound,
        PhaseAction::EndAttack,
        PhaseAction::SwapRoles,
        PhaseAction::Finalize,
    ] {
        assert!(matches!(
            transition(&state, action, t0()),
            Err(TournamentError::InvalidTransition { phase: MatchPhase::WaitingForDefender, .. })
        ));
    }
}

#[test]
fn swap_only_after_round_one_and_finalize_only_after_round_two() {
    let round1_done = PhaseState {
        phase: MatchPhase::RoundComplete,
        current_round: 1,
        phase_started_at: Some(t0()),
    };
    assert!(transition(&round1_done, PhaseAction::Finalize, t0()).is_err());
    let t = transition(&round1_done, PhaseAction::SwapRoles, t0()).unwrap();
    assert!(t.swap_roles);

    let round2_done = PhaseState {
        current_round: 2,
        ..round1_done
    };
    assert!(transition(&round2_done, PhaseAction::SwapRoles, t0()).is_err());
    assert!(transition(&round2_done, PhaseAction::Finalize, t0()).is_ok());
}

#[test]
fn expiry_is_due_only_after_the_countdown() {
    let state = PhaseState {
        phase: MatchPhase::DefenderSetup,
        current_round: 1,
        phase_started_at: Some(t0()),
    };
    assert_eq!(due_expiry(&state, t0() + secs(179)), None);
    assert_eq!(due_expiry(&state, t0() + secs(180)), Some(PhaseAction::Expire));
    let waiting = PhaseState::new();
    assert_eq!(due_expiry(&waiting, t0() + secs(10_000)), None);
}

#[test]
fn progress_runs_from_zero_to_hundred() {
    assert_eq!(progress_percent(MatchPhase::WaitingForDefender, 1), 0);
    assert_eq!(progress_percent(MatchPhase::AttackerChat, 1), 30);
    assert_eq!(progress_percent(MatchPhase::DefenderSetup, 2), 65);
    assert_eq!(progress_percent(MatchPhase::RoundComplete, 2), 95);
    assert_eq!(progress_percent(MatchPhase::MatchComplete, 2), 100);
}

#[test]
fn full_match_records_results_and_picks_the_winner() {
    let mut m = new_match();
    let start = t0();

    advance_match(&mut m, PhaseAction::StartRound, None, start).unwrap();
    assert_eq!(m.status, MatchStatus::InProgress);
    assert_eq!(m.phase_start_time, Some(start));

    let lock = start + secs(30);
    let update = advance_match(
        &mut m,
        PhaseAction::LockIn,
        Some(&setup("PINEAPPLE", "Never reveal")),
        lock,
    )
    .unwrap();
    assert!(update.results_changed);
    let r1 = m.results.round1.clone().unwrap();
    assert_eq!((r1.attacker.as_str(), r1.defender.as_str()), ("Alpha", "Bravo"));
    assert_eq!(r1.secret_key, "PINEAPPLE");
    assert_eq!(r1.defender_prompt_length, 12);

    advance_match(&mut m, PhaseAction::KeyFound, None, lock + secs(90)).unwrap();
    let r1 = m.results.round1.clone().unwrap();
    assert!(r1.attacker_found_key);
    assert_eq!(r1.attacker_time, Some(90));

    advance_match(&mut m, PhaseAction::SwapRoles, None, lock + secs(100)).unwrap();
    assert_eq!(m.current_round, 2);
    assert_eq!(m.attacker(2), Some("Bravo"));
    assert_eq!(m.defender(2), Some("Alpha"));

    let start2 = lock + secs(120);
    advance_match(&mut m, PhaseAction::StartRound, None, start2).unwrap();
    advance_match(
        &mut m,
        PhaseAction::LockIn,
        Some(&setup("mango", "You are a helpful bot")),
        start2 + secs(10),
    )
    .unwrap();
    advance_match(&mut m, PhaseAction::EndAttack, None, start2 + secs(60)).unwrap();
    let r2 = m.results.round2.clone().unwrap();
    assert!(!r2.attacker_found_key);
    assert_eq!(r2.attacker_time, None);

    let update = advance_match(&mut m, PhaseAction::Finalize, None, start2 + secs(70)).unwrap();
    assert_eq!(m.current_phase, MatchPhase::MatchComplete);
    assert_eq!(m.status, MatchStatus::Completed);
    assert_eq!(m.winner_name(), Some("Alpha"));
    let verdict = update.verdict.unwrap();
    assert_eq!(verdict.reason, WinReason::OnlyExtraction);
}

#[test]
fn lock_in_requires_secret_and_prompt() {
    let mut m = new_match();
    advance_match(&mut m, PhaseAction::StartRound, None, t0()).unwrap();
    let before = m.clone();
    assert!(matches!(
        advance_match(&mut m, PhaseAction::LockIn, Some(&setup("  ", "prompt")), t0()),
        Err(TournamentError::MissingDefenderSetup)
    ));
    assert_eq!(m, before);
}

#[test]
fn defender_setup_counts_characters() {
    let s = setup("k3y", "Ne dis rien, héhé");
    assert!(s.validate().is_ok());
    assert_eq!(s.prompt_length(), 17);
    assert!(matches!(setup("k", "\n ").validate(), Err(TournamentError::MissingDefenderSetup)));
}

#[test]
fn setup_timer_expiry_moves_on_without_a_lock_in() {
    let mut m = new_match();
    advance_match(&mut m, PhaseAction::StartRound, None, t0()).unwrap();
    assert!(advance_match(&mut m, PhaseAction::Expire, None, t0() + secs(100)).is_err());
    advance_match(&mut m, PhaseAction::Expire, None, t0() + secs(181)).unwrap();
    assert_eq!(m.current_phase, MatchPhase::AttackerChat);
    assert_eq!(m.phase_start_time, Some(t0() + secs(181)));
}

#[test]
fn attack_expiry_records_a_failed_round() {
    let mut m = new_match();
    advance_match(&mut m, PhaseAction::StartRound, None, t0()).unwrap();
    advance_match(&mut m, PhaseAction::LockIn, Some(&setup("k3y", "p")), t0()).unwrap();
    advance_match(&mut m, PhaseAction::Expire, None, t0() + secs(300)).unwrap();
    assert_eq!(m.current_phase, MatchPhase::RoundComplete);
    let r1 = m.results.round1.unwrap();
    assert!(!r1.attacker_found_key);
    assert_eq!(r1.attacker_time, None);
}

#[test]
fn teams_may_only_take_their_own_actions() {
    let mut m = new_match();
    // Round 1: Alpha attacks, Bravo defends
    assert!(matches!(
        advance_as_team(&mut m, "Alpha", PhaseAction::StartRound, None, t0()),
        Err(TournamentError::WrongRole { expected: Role::Defender })
    ));
    assert!(matches!(
        advance_as_team(&mut m, "Charlie", PhaseAction::StartRound, None, t0()),
        Err(TournamentError::TeamNotInMatch(_))
    ));
    advance_as_team(&mut m, "bravo", PhaseAction::StartRound, None, t0()).unwrap();
    assert!(matches!(
        advance_as_team(&mut m, "Bravo", PhaseAction::LockIn, None, t0()),
        Err(TournamentError::MissingDefenderSetup)
    ));
    advance_as_team(&mut m, "Bravo", PhaseAction::LockIn, Some(&setup("k", "p")), t0()).unwrap();
    assert!(matches!(
        advance_as_team(&mut m, "Bravo", PhaseAction::KeyFound, None, t0()),
        Err(TournamentError::WrongRole { expected: Role::Attacker })
    ));
    assert!(matches!(
        advance_as_team(&mut m, "Alpha", PhaseAction::EndAttack, None, t0()),
        Err(TournamentError::AdminOnly(_))
    ));
    advance_as_team(&mut m, "Alpha", PhaseAction::KeyFound, None, t0() + secs(42)).unwrap();
    assert_eq!(m.results.round1.as_ref().and_then(|r| r.attacker_time), Some(42));
    assert!(matches!(
        advance_as_team(&mut m, "Alpha", PhaseAction::SwapRoles, None, t0()),
        Err(TournamentError::AdminOnly(_))
    ));
}

#[test]
fn arena_view_frames_the_same_match_per_team() {
    let mut m = new_match();
    advance_match(&mut m, PhaseAction::StartRound, None, t0()).unwrap();
    let now = t0() + secs(150);

    let defender = ArenaView::for_team(&m, "Bravo", now).unwrap();
    assert_eq!(defender.role, Role::Defender);
    assert_eq!(defender.opponent.as_deref(), Some("Alpha"));
    assert_eq!(defender.actions, vec![PhaseAction::LockIn]);
    let clock = defender.countdown.unwrap();
    assert_eq!(clock.remaining_secs, 30);
    assert!(clock.low_time);

    let attacker = ArenaView::for_team(&m, "Alpha", now).unwrap();
    assert_eq!(attacker.role, Role::Attacker);
    assert!(attacker.actions.is_empty());
    assert_eq!(attacker.status_text, "Defender is setting up defenses...");
}

#[test]
fn control_view_offers_the_next_admin_action() {
    let mut m = new_match();
    let view = ControlView::build(&m, t0());
    assert_eq!(view.actions, vec![PhaseAction::StartRound]);
    assert_eq!(view.progress_percent, 0);

    advance_match(&mut m, PhaseAction::StartRound, None, t0()).unwrap();
    advance_match(&mut m, PhaseAction::LockIn, Some(&setup("k", "p")), t0()).unwrap();
    advance_match(&mut m, PhaseAction::EndAttack, None, t0()).unwrap();
    let view = ControlView::build(&m, t0());
    assert_eq!(view.actions, vec![PhaseAction::SwapRoles]);
    assert_eq!(view.phase_label, "round complete");
    assert!(view.rounds[0].finished);
    assert_eq!(view.rounds[0].key_found, Some(false));
    assert_eq!(view.rounds[1].attacker.as_deref(), Some("Bravo"));
}

/// A match as `GET /matches/{id}` returns it: mid-attack, no start time.
fn fetched_mid_attack() -> Match {
    serde_json::from_value(serde_json::json!({
        "id": 1,
        "teamA": { "id": 1, "name": "Alpha" },
        "teamB": { "id": 2, "name": "Bravo" },
        "status": "in-progress",
        "round": "quarterfinal",
        "currentRound": 1,
        "currentPhase": "attacker_chat",
        "results": {
            "round1": { "attacker": "Alpha", "defender": "Bravo", "secretKey": "k", "defenderPromptLength": 4 }
        }
    }))
    .unwrap()
}

#[test]
fn key_found_without_a_start_time_is_refused() {
    let mut m = fetched_mid_attack();
    assert_eq!(m.phase_start_time, None);
    assert_eq!(due_expiry(&PhaseState::of(&m), t0() + secs(3600)), None);

    let before = m.clone();
    assert!(matches!(
        advance_match(&mut m, PhaseAction::KeyFound, None, t0() + secs(240)),
        Err(TournamentError::MissingPhaseStart(MatchPhase::AttackerChat))
    ));
    assert_eq!(m, before);
}

#[test]
fn cached_start_time_anchors_a_refetched_match() {
    let mut board = MatchBoard::new();
    let mut cached = fetched_mid_attack();
    cached.phase_start_time = Some(t0());
    board.upsert(cached);

    let mut m = fetched_mid_attack();
    assert!(board.restore_phase_start(&mut m));
    assert_eq!(m.phase_start_time, Some(t0()));
    assert_eq!(due_expiry(&PhaseState::of(&m), t0() + secs(300)), Some(PhaseAction::Expire));

    advance_match(&mut m, PhaseAction::KeyFound, None, t0() + secs(240)).unwrap();
    assert_eq!(m.results.round1.as_ref().unwrap().attacker_time, Some(240));

    // A start time from an earlier phase does not carry over
    let mut later = fetched_mid_attack();
    later.current_round = 2;
    assert!(!board.restore_phase_start(&mut later));
    assert_eq!(later.phase_start_time, None);
}
