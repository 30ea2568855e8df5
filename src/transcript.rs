//! Conversation transcript
//!
//! Ordered user/agent turns kept per session and replayed into prompts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Oldest turns are dropped past this many messages
pub const MAX_MESSAGES: usize = 40;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
}

impl TranscriptMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: VecDeque<TranscriptMessage>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(MAX_MESSAGES)
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    pub fn add_message(&mut self, message: TranscriptMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
        self.updated_at = Utc::now();
    }

    /// Record one completed exchange
    pub fn record_exchange(&mut self, user: &str, agent: &str) {
        self.add_message(TranscriptMessage::new(MessageRole::User, user));
        self.add_message(TranscriptMessage::new(MessageRole::Agent, agent));
    }

    pub fn messages(&self) -> impl Iterator<Item = &TranscriptMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `User: ...` / `Bot: ...` lines for prompt templates
    pub fn formatted(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let who = match m.role {
                    MessageRole::User => "User",
                    MessageRole::Agent => "Bot",
                };
                format!("{}: {}", who, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_exchange_keeps_order() {
        let mut t = Transcript::new();
        t.record_exchange("3", "Here are the details of Kalia");
        t.record_exchange("am i eligible as sc?", "Yes, SC farmers qualify.");

        assert_eq!(t.len(), 4);
        let roles: Vec<_> = t.messages().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Agent, MessageRole::User, MessageRole::Agent]
        );
        assert!(t.formatted().starts_with("User: 3\nBot: Here are the details of Kalia"));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut t = Transcript::with_capacity(4);
        for i in 0..3 {
            t.record_exchange(&format!("q{}", i), &format!("a{}", i));
        }
        assert_eq!(t.len(), 4);
        assert_eq!(t.messages().next().map(|m| m.content.as_str()), Some("q1"));
    }
}
