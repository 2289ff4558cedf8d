//! Bounded per-id conversation history (Session Store).
//!
//! Each session keeps a system prompt plus a rolling window of the last
//! three Q&A pairs. Sessions idle for more than two hours are discarded and
//! rebuilt from scratch on the next access — losing history is intentional.
//! Nothing here is persisted across restarts.

use crate::clock::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// System message plus three Q&A pairs.
pub const MAX_MESSAGES: usize = 7;

/// Non-system messages retained after trimming.
const KEEP_TAIL: usize = MAX_MESSAGES - 1;

/// Idle time after which a session is discarded.
const SESSION_EXPIRY: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

struct Session {
    messages: Vec<Message>,
    last_activity: Instant,
}

pub struct SessionStore {
    sessions: HashMap<String, Session>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: HashMap::new(),
            clock,
        }
    }

    /// Ensure a live session exists for `id`, discarding an expired one.
    pub fn get_or_create(&mut self, id: &str, system_prompt: &str) {
        self.expire_if_stale(id);
        if !self.sessions.contains_key(id) {
            log::info!("[SESSION] Creating new session: {}", id);
            self.sessions.insert(
                id.to_string(),
                Session {
                    messages: vec![Message {
                        role: Role::System,
                        content: system_prompt.to_string(),
                    }],
                    last_activity: self.clock.now(),
                },
            );
        }
    }

    /// Append the tentative user message for the turn being dispatched.
    pub fn append_user(&mut self, id: &str, text: &str) {
        self.append(id, Role::User, text);
    }

    /// Commit the assistant's answer for a successful turn.
    pub fn append_assistant(&mut self, id: &str, text: &str) {
        self.append(id, Role::Assistant, text);
    }

    fn append(&mut self, id: &str, role: Role, text: &str) {
        let now = self.clock.now();
        let session = match self.sessions.get_mut(id) {
            Some(s) => s,
            None => {
                log::warn!("[SESSION] Append to unknown session: {}", id);
                return;
            }
        };
        session.messages.push(Message {
            role,
            content: text.to_string(),
        });
        session.last_activity = now;

        // Rolling window: keep the system message plus the newest exchanges.
        if session.messages.len() > MAX_MESSAGES {
            let tail_start = session.messages.len() - KEEP_TAIL;
            session.messages.drain(1..tail_start);
            log::debug!("[SESSION] Trimmed session {} to {} messages", id, MAX_MESSAGES);
        }
    }

    /// Remove the last message if it is the tentative user message of a
    /// failed turn, so failed turns never pollute history.
    pub fn rollback_last_user(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            if session.messages.last().map(|m| m.role) == Some(Role::User) {
                session.messages.pop();
                log::info!("[SESSION] Rolled back user message on session {}", id);
            }
        }
    }

    /// Render prior turns as alternating "Human:"/"Assistant:" lines, for
    /// providers without native multi-turn structure. Empty for a fresh
    /// session.
    pub fn context_block(&mut self, id: &str) -> String {
        self.expire_if_stale(id);
        let session = match self.sessions.get(id) {
            Some(s) => s,
            None => return String::new(),
        };
        session
            .messages
            .iter()
            .filter_map(|m| match m.role {
                Role::System => None,
                Role::User => Some(format!("Human: {}", m.content)),
                Role::Assistant => Some(format!("Assistant: {}", m.content)),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Message count for a session, 0 if absent.
    pub fn message_count(&self, id: &str) -> usize {
        self.sessions.get(id).map(|s| s.messages.len()).unwrap_or(0)
    }

    /// All messages of a session, oldest first.
    pub fn messages(&self, id: &str) -> Vec<Message> {
        self.sessions
            .get(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    fn expire_if_stale(&mut self, id: &str) {
        let now = self.clock.now();
        let stale = self
            .sessions
            .get(id)
            .map(|s| now.duration_since(s.last_activity) > SESSION_EXPIRY)
            .unwrap_or(false);
        if stale {
            self.sessions.remove(id);
            log::info!("[SESSION] Session {} expired and was cleared", id);
        }
    }
}
