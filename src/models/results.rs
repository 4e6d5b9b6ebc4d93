//! Per-round results: who attacked, who defended, and how it went.

use serde::{Deserialize, Serialize};

/// Round within a match: 1 or 2.
pub type RoundNumber = u8;

/// Outcome of one attacker/defender round.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Attacking team name.
    #[serde(default)]
    pub attacker: String,
    /// Defending team name.
    #[serde(default)]
    pub defender: String,
    #[serde(default, alias = "attackerFoundKey")]
    pub attacker_found_key: bool,
    /// Seconds into the attack phase when the key was extracted.
    #[serde(default, alias = "attackerTime")]
    pub attacker_time: Option<u32>,
    /// System prompt length in characters.
    #[serde(default, alias = "defenderPromptLength")]
    pub defender_prompt_length: u32,
    #[serde(default, alias = "secretKey")]
    pub secret_key: String,
}

impl RoundResult {
    pub fn new(attacker: impl Into<String>, defender: impl Into<String>) -> Self {
        Self {
            attacker: attacker.into(),
            defender: defender.into(),
            ..Self::default()
        }
    }

    /// Extraction time, only when the key was actually found.
    pub fn extraction_time(&self) -> Option<u32> {
        if self.attacker_found_key {
            self.attacker_time
        } else {
            None
        }
    }

    /// Record the defender's locked-in secret and prompt.
    pub fn lock_in(&mut self, secret_key: &str, system_prompt: &str) {
        self.secret_key = secret_key.trim().to_string();
        self.defender_prompt_length = system_prompt.chars().count() as u32;
    }

    /// Record a successful extraction at `seconds` into the attack.
    pub fn record_extraction(&mut self, seconds: u32) {
        self.attacker_found_key = true;
        self.attacker_time = Some(seconds);
    }

    /// Record an attack that ran out of time (or was ended) without the key.
    pub fn record_failure(&mut self) {
        self.attacker_found_key = false;
        self.attacker_time = None;
    }
}

/// Both rounds of a match. A round is absent until its defender locks in.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchResults {
    #[serde(default)]
    pub round1: Option<RoundResult>,
    #[serde(default)]
    pub round2: Option<RoundResult>,
}

impl MatchResults {
    pub fn for_round(&self, round: RoundNumber) -> Option<&RoundResult> {
        match round {
            1 => self.round1.as_ref(),
            2 => self.round2.as_ref(),
            _ => None,
        }
    }

    pub fn for_round_mut(&mut self, round: RoundNumber) -> Option<&mut Option<RoundResult>> {
        match round {
            1 => Some(&mut self.round1),
            2 => Some(&mut self.round2),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.round1.is_some() && self.round2.is_some()
    }
}
