use crate::client::QuizGenerator;
use crate::models::{ChatMessage, UserProfile};
use chrono::Utc;
use uuid::Uuid;

pub const TUTOR_ID: &str = "ai";
pub const TUTOR_NAME: &str = "MindForge AI";

/// Append-only message log for one conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(seed: Vec<ChatMessage>) -> Self {
        Self { messages: seed }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, sender_id: &str, sender_name: &str, text: &str, is_ai: bool) -> &ChatMessage {
        self.messages.push(ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            text: text.into(),
            timestamp: Utc::now(),
            is_ai,
        });
        &self.messages[self.messages.len() - 1]
    }
}

/// One-on-one conversation with the AI tutor.
#[derive(Debug, Clone)]
pub struct TutorChat {
    log: Conversation,
}

impl TutorChat {
    pub fn new(student: &str) -> Self {
        let mut log = Conversation::default();
        log.push(
            TUTOR_ID,
            TUTOR_NAME,
            &format!(
                "Hi {student}! 👋 I'm your AI study buddy. Need help understanding a concept, or want a quick challenge?"
            ),
            true,
        );
        Self { log }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    /// Appends the student's message, then the tutor's reply. Blank input
    /// is ignored.
    pub async fn send(&mut self, tutor: &QuizGenerator, input: &str) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }
        let before = self.log.len();
        self.log.push("user", "You", input, false);
        let reply = tutor.chat(&self.log.messages()[..before], input).await;
        Some(self.log.push(TUTOR_ID, TUTOR_NAME, &reply, true))
    }
}

/// Study-group chat; messages stay local to this process.
#[derive(Debug, Clone)]
pub struct GroupChat {
    pub group_id: String,
    log: Conversation,
}

impl GroupChat {
    pub fn new(group_id: impl Into<String>, seed: Vec<ChatMessage>) -> Self {
        Self {
            group_id: group_id.into(),
            log: Conversation::new(seed),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    pub fn send(&mut self, from: &UserProfile, input: &str) -> Option<&ChatMessage> {
        if input.trim().is_empty() {
            return None;
        }
        let first_name = from.name.split_whitespace().next().unwrap_or(&from.name);
        Some(self.log.push(&from.id, first_name, input, false))
    }
}
