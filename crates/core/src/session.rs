use crate::render::{FailureNotice, RecommendationCard};
use crate::time::ist;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

pub const GREETING: &str = "నమస్కారం రైతు సోదరులారా! (Greetings Farmer!)\n\n\
మీ పంట అమ్మడానికి సరైన సమయం కోసం నన్ను అడగండి. మీరు మీ పంట ఫోటో తీసి కూడా పంపవచ్చు.\n\n\
(Ask me for the best time to sell. You can also send a photo for quality check.)";

pub const CHAT_HELP: &str = "I couldn't quite catch the crop name or location. \
Please say something like: 'Price for 50 KG of Tomato in Warangal'";

/// Greeting plus the most recent messages; older ones are dropped.
pub const MAX_HISTORY: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Chat,
    Form,
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(View::Chat),
            "form" | "dashboard" => Ok(View::Form),
            other => anyhow::bail!("unknown view: {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    Prediction { card: Box<RecommendationCard> },
    Failure { notice: FailureNotice },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub body: MessageBody,
    pub has_image: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            body,
            has_image: false,
            timestamp: Utc::now(),
        }
    }

    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self::new(sender, MessageBody::Text { text: text.into() })
    }

    pub fn clock(&self) -> String {
        ist::format_clock(self.timestamp)
    }
}

/// Conversation state for one farmer. Owned by whoever runs the interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub messages: Vec<ChatMessage>,
    pub view: View,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::text(Sender::Ai, GREETING)],
            view: View::Chat,
        }
    }

    /// Appends a message. The greeting always stays first; beyond
    /// [`MAX_HISTORY`] the oldest messages after it are dropped.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > MAX_HISTORY {
            let excess = self.messages.len() - MAX_HISTORY;
            self.messages.drain(1..=excess);
        }
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_greeting_in_chat_view() {
        let session = Session::new();
        assert_eq!(session.view, View::Chat);
        assert_eq!(session.messages.len(), 1);
        let first = &session.messages[0];
        assert_eq!(first.sender, Sender::Ai);
        assert!(matches!(&first.body, MessageBody::Text { text } if text.contains("Greetings Farmer")));
    }

    #[test]
    fn parses_views() {
        assert_eq!("form".parse::<View>().unwrap(), View::Form);
        assert_eq!("Dashboard".parse::<View>().unwrap(), View::Form);
        assert_eq!(" chat".parse::<View>().unwrap(), View::Chat);
        assert!("settings".parse::<View>().is_err());
    }

    #[test]
    fn messages_get_unique_ids() {
        let a = ChatMessage::text(Sender::User, "a");
        let b = ChatMessage::text(Sender::User, "a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn history_is_capped_behind_the_greeting() {
        let mut session = Session::new();
        for i in 0..(MAX_HISTORY * 2) {
            session.push(ChatMessage::text(Sender::User, format!("msg {i}")));
        }
        assert_eq!(session.messages.len(), MAX_HISTORY);
        assert!(
            matches!(&session.messages[0].body, MessageBody::Text { text } if text == GREETING)
        );
        let oldest_kept = format!("msg {}", MAX_HISTORY + 1);
        assert!(matches!(&session.messages[1].body, MessageBody::Text { text } if *text == oldest_kept));
        let last = format!("msg {}", MAX_HISTORY * 2 - 1);
        assert!(matches!(&session.last().unwrap().body, MessageBody::Text { text } if *text == last));
    }
}
