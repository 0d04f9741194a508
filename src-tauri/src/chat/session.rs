//! Chat Session - message list and the send/stream state machine
//!
//! State diagram:
//! ```text
//! Idle ──begin_send──> Sending ──chunk──> Streaming ──resolve──> Resolved
//!                         │                   │
//!                         │                 [chunk]
//!                         │                   │
//!                         └──────fail─────────┴────────────────> Failed
//! ```
//!
//! Resolved and Failed accept a new send just like Idle. At most one assistant
//! placeholder is in flight, and it is always the last message.

use log::debug;
use thiserror::Error;
use uuid::Uuid;

use super::composer::{ComposerAction, KeyPress};
use super::{ChatMessage, Composer, Role};
use crate::events::ChatMessageChunk;
use crate::llm::{BackendError, MessagePayload, SendMessageRequest};
use crate::models::ModelSelector;

/// Shown in place of the assistant reply when the backend call fails.
pub const SEND_ERROR_MESSAGE: &str = "Sorry, there was an error sending your message. Please try again.";

/// First assistant message of a new session. Never sent as history.
pub const WELCOME_MESSAGE: &str = "Hello! I'm your local AI assistant. How can I help you today?";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("No active model selected")]
    NoActiveModel,
    #[error("Message is empty")]
    EmptyInput,
    #[error("A message is already being sent")]
    SendInFlight,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Resolved,
    Failed,
}

/// A send that has been applied to the session and awaits the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub message_id: String,
    pub request: SendMessageRequest,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    welcome_id: Option<String>,
    composer: Composer,
    active_model: Option<ModelSelector>,
    /// Correlation id of the in-flight send
    pending: Option<String>,
    phase: ChatPhase,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session opening with an assistant greeting.
    pub fn with_welcome(message: impl Into<String>) -> Self {
        let welcome = ChatMessage::assistant(message);
        Self {
            welcome_id: Some(welcome.id.clone()),
            messages: vec![welcome],
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    pub fn input(&self) -> &str {
        self.composer.input()
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.composer.set_input(input);
    }

    pub fn active_model(&self) -> Option<&ModelSelector> {
        self.active_model.as_ref()
    }

    pub fn set_active_model(&mut self, selector: Option<ModelSelector>) {
        self.active_model = selector;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Input box is usable: a model is selected and nothing is in flight.
    pub fn is_input_enabled(&self) -> bool {
        self.active_model.is_some() && !self.is_loading()
    }

    /// Send control is enabled.
    pub fn can_send(&self) -> bool {
        self.is_input_enabled() && !self.composer.is_blank()
    }

    /// Whether `message` should render as a loading indicator.
    pub fn is_placeholder_loading(&self, message: &ChatMessage) -> bool {
        self.is_loading() && message.role == Role::Assistant && message.content.is_empty()
    }

    pub fn handle_key(&mut self, press: KeyPress) -> ComposerAction {
        if !self.is_input_enabled() {
            return ComposerAction::Ignored;
        }
        self.composer.handle_key(press)
    }

    /// Append the user message and an assistant placeholder, clear the input
    /// and build the backend request under a fresh correlation id.
    pub fn begin_send(&mut self) -> Result<PendingSend, ChatError> {
        if self.is_loading() {
            return Err(ChatError::SendInFlight);
        }
        let selector = self.active_model.clone().ok_or(ChatError::NoActiveModel)?;
        if self.composer.is_blank() {
            return Err(ChatError::EmptyInput);
        }

        let user_message = ChatMessage::user(self.composer.take_input());
        let message_id = Uuid::new_v4().to_string();

        let messages = self
            .messages
            .iter()
            .filter(|m| Some(&m.id) != self.welcome_id.as_ref())
            .chain(std::iter::once(&user_message))
            .map(MessagePayload::from)
            .collect();

        self.messages.push(user_message);
        self.messages.push(ChatMessage::placeholder(&message_id));
        self.pending = Some(message_id.clone());
        self.phase = ChatPhase::Sending;

        Ok(PendingSend {
            request: SendMessageRequest {
                model_id: selector.model_id,
                parameter_size: selector.parameter_size,
                message_id: message_id.clone(),
                messages,
            },
            message_id,
        })
    }

    /// Append a streamed fragment. Returns false when the chunk belongs to
    /// some other request.
    pub fn apply_chunk(&mut self, chunk: &ChatMessageChunk) -> bool {
        let Some(placeholder) = self.pending_placeholder(&chunk.message_id) else {
            debug!("Dropping chunk for stale message {}", chunk.message_id);
            return false;
        };

        placeholder.content.push_str(&chunk.fragment);
        self.phase = ChatPhase::Streaming;
        true
    }

    /// Replace the placeholder with the final reply.
    pub fn resolve(&mut self, message_id: &str, content: impl Into<String>) -> bool {
        self.finish(message_id, content.into(), ChatPhase::Resolved)
    }

    /// Replace the placeholder with [`SEND_ERROR_MESSAGE`].
    pub fn fail(&mut self, message_id: &str) -> bool {
        self.finish(message_id, SEND_ERROR_MESSAGE.to_string(), ChatPhase::Failed)
    }

    fn finish(&mut self, message_id: &str, content: String, phase: ChatPhase) -> bool {
        let Some(placeholder) = self.pending_placeholder(message_id) else {
            return false;
        };

        placeholder.content = content;
        self.pending = None;
        self.phase = phase;
        true
    }

    fn pending_placeholder(&mut self, message_id: &str) -> Option<&mut ChatMessage> {
        if self.pending.as_deref() != Some(message_id) {
            return None;
        }
        self.messages.last_mut().filter(|m| m.id == message_id)
    }
}
