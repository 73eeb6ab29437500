//! Completion clients.
//!
//! A [`CompletionRequest`] is always `[system prompt] + transcript + [new user message]`. The
//! upstream client sends it to an OpenAI-compatible API; the relay client sends the turns and the
//! mode to the gateway, which rebuilds the same request on its side.

mod openai;
mod relay;

pub use openai::OpenAiClient;
pub use relay::RelayClient;

use crate::mode::Mode;
use crate::transcript::{Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Returned in place of a reply when the backend produced no candidate.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";

/// Role of a message on the completion wire. Only requests carry `system`; transcripts never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

impl From<Role> for WireRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => WireRole::User,
            Role::Assistant => WireRole::Assistant,
        }
    }
}

/// One wire message sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: WireRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::System,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(t: &Turn) -> Self {
        Self {
            role: t.role.into(),
            content: t.content.clone(),
        }
    }
}

/// A user or assistant turn of the conversation, as relayed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&Message> for Turn {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// Conversation for one completion call. The mode's system prompt always goes first on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    mode: Mode,
    turns: Vec<Turn>,
}

impl CompletionRequest {
    /// `[system(mode)] + transcript + [user(new_message)]`.
    pub fn build(mode: Mode, transcript: &[Message], new_message: &str) -> Self {
        let turns = transcript
            .iter()
            .map(Turn::from)
            .chain(std::iter::once(Turn::user(new_message)));
        Self::from_turns(mode, turns)
    }

    /// Request for already-ordered user/assistant turns; the system prompt comes from `mode`.
    pub fn from_turns(mode: Mode, turns: impl IntoIterator<Item = Turn>) -> Self {
        Self {
            mode,
            turns: turns.into_iter().collect(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn system_prompt(&self) -> &str {
        self.mode.system_prompt()
    }

    /// Full wire conversation including the system message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.system_prompt()))
            .chain(self.turns.iter().map(ChatMessage::from))
            .collect()
    }

    /// Everything after the system message.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion not authorized")]
    Unauthorized,
    #[error("completion api error: {status} {message}")]
    Api { status: u16, message: String },
}

/// Produces the assistant reply for a request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        (**self).complete(request).await
    }
}
