//! Scripted attacker chat and the admin's attacker monitor.
//!
//! The assistant side is canned content matching, not a model. The only rule that
//! matters for the match is key detection: the secret appearing (case-insensitively)
//! in an attacker message ends the round.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TournamentError;

pub const GREETING: &str = "Hello! I'm an AI assistant. How can I help you today?";

const DEFAULT_REPLIES: [&str; 5] = [
    "I'm here to assist you with information and tasks. What else would you like to know?",
    "That's an interesting question. I'm designed to be helpful while maintaining security guidelines.",
    "I'm not sure I understand what you're asking for. Could you please clarify?",
    "I'm happy to help with your questions, but I need to ensure I'm not sharing sensitive information.",
    "I'm programmed to be helpful, harmless, and honest in my interactions.",
];

/// Terms that raise a monitor alert.
pub const ALERT_TERMS: [&str; 6] = [
    "secret",
    "key",
    "password",
    "credentials",
    "system prompt",
    "ignore",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The attacking team.
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub flagged: bool,
}

impl ChatMessage {
    fn new(role: Speaker, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp,
            flagged: false,
        }
    }
}

/// Case-insensitive substring check of the secret in a message. An empty secret never matches.
pub fn contains_secret(message: &str, secret_key: &str) -> bool {
    let secret = secret_key.trim();
    !secret.is_empty() && message.to_lowercase().contains(&secret.to_lowercase())
}

/// One attacker message and the assistant's answer.
#[derive(Clone, Debug, Serialize)]
pub struct ChatExchange {
    pub message: ChatMessage,
    pub reply: ChatMessage,
    pub key_found: bool,
}

/// Transcript of one attack phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTranscript {
    pub messages: Vec<ChatMessage>,
    pub closed: bool,
}

impl ChatTranscript {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            messages: vec![ChatMessage::new(Speaker::Assistant, GREETING, now)],
            closed: false,
        }
    }

    /// Append an attacker message and a scripted reply.
    ///
    /// Finding the key does not close the transcript; that happens once the round is
    /// recorded as complete, so a failed save leaves the attacker able to resubmit.
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        input: &str,
        secret_key: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<ChatExchange, TournamentError> {
        if self.closed {
            return Err(TournamentError::ChatClosed);
        }
        if input.trim().is_empty() {
            return Err(TournamentError::EmptyMessage);
        }
        let key_found = contains_secret(input, secret_key);
        let mut message = ChatMessage::new(Speaker::User, input, now);
        message.flagged = !alert_terms(input).is_empty();
        let reply = ChatMessage::new(Speaker::Assistant, scripted_reply(input, secret_key, rng), now);
        self.messages.push(message.clone());
        self.messages.push(reply.clone());
        Ok(ChatExchange {
            message,
            reply,
            key_found,
        })
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Mark a message for review. Returns false for an unknown id.
    pub fn flag(&mut self, message_id: Uuid) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(m) => {
                m.flagged = true;
                true
            }
            None => false,
        }
    }

    pub fn attempts(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Speaker::User)
            .count()
    }
}

/// Canned assistant reply for an attacker message.
pub fn scripted_reply<R: Rng + ?Sized>(input: &str, secret_key: &str, rng: &mut R) -> String {
    let lower = input.to_lowercase();

    if lower.contains("password") || lower.contains("secret") || lower.contains("key") {
        return "I'm not allowed to share any passwords or secret keys. Is there something else I can help you with?".to_string();
    }
    if lower.contains("system") || lower.contains("prompt") {
        return "I operate based on my training and guidelines. I'm here to assist you with information and tasks while keeping security in mind.".to_string();
    }
    if lower.contains("help") || lower.contains("assist") {
        return "I'm here to help answer questions and provide information on a wide range of topics. What would you like to know?".to_string();
    }
    if lower.contains("who") && lower.contains("you") {
        return "I'm an AI assistant designed to be helpful, harmless, and honest. I'm here to assist with your questions and tasks.".to_string();
    }

    let secret: Vec<char> = secret_key.trim().chars().collect();
    let hits = secret
        .iter()
        .flat_map(|c| c.to_lowercase())
        .filter(|c| lower.contains(*c))
        .count();
    if secret.len() > 4 && hits * 2 > secret.len() && rng.gen_bool(0.3) {
        return format!(
            "I should be careful here. The information you're asking about might be related to sensitive data like \"{}\"...",
            mask_secret(&secret)
        );
    }

    DEFAULT_REPLIES
        .choose(rng)
        .copied()
        .unwrap_or(DEFAULT_REPLIES[0])
        .to_string()
}

/// First two and last two characters, the rest starred.
fn mask_secret(secret: &[char]) -> String {
    let n = secret.len();
    let head: String = secret[..2].iter().collect();
    let tail: String = secret[n - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(n - 4), tail)
}

fn alert_terms(content: &str) -> Vec<&'static str> {
    let lower = content.to_lowercase();
    ALERT_TERMS
        .iter()
        .copied()
        .filter(|term| lower.contains(term))
        .collect()
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// What the admin's attacker monitor shows for a transcript.
#[derive(Clone, Debug, Serialize)]
pub struct MonitorReport {
    pub attempts: usize,
    pub alerts: Vec<&'static str>,
    pub flagged: Vec<Uuid>,
    pub danger: DangerLevel,
}

impl MonitorReport {
    /// Danger rises to `high` once the key appears in an attacker message, `medium` when its
    /// first three characters do. It never goes back down.
    pub fn scan(transcript: &ChatTranscript, secret_key: &str) -> Self {
        let secret = secret_key.trim().to_lowercase();
        let prefix: String = secret.chars().take(3).collect();
        let mut alerts = Vec::new();
        let mut danger = DangerLevel::Low;

        for m in transcript.messages.iter().filter(|m| m.role == Speaker::User) {
            let lower = m.content.to_lowercase();
            alerts.extend(alert_terms(&m.content));
            let level = if !secret.is_empty() && lower.contains(&secret) {
                DangerLevel::High
            } else if !prefix.is_empty() && lower.contains(&prefix) {
                DangerLevel::Medium
            } else {
                DangerLevel::Low
            };
            danger = danger.max(level);
        }

        Self {
            attempts: transcript.attempts(),
            alerts,
            flagged: transcript
                .messages
                .iter()
                .filter(|m| m.flagged)
                .map(|m| m.id)
                .collect(),
            danger,
        }
    }
}
