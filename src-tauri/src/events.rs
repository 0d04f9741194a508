//! Push events delivered out-of-band from backend commands.
//!
//! Payloads serialize as JSON arrays, which is what the webview listeners
//! destructure:
//! - `model-download-progress` → `[modelId, parameterSize, progressPercent]`
//! - `chat-message-chunk` → `[messageId, textFragment]`

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::models::ModelSelector;

pub const MODEL_DOWNLOAD_PROGRESS: &str = "model-download-progress";
pub const CHAT_MESSAGE_CHUNK: &str = "chat-message-chunk";

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String, u8)", into = "(String, String, u8)")]
pub struct ModelDownloadProgress {
    pub model_id: String,
    pub parameter_size: String,
    /// 0-100
    pub progress: u8,
}

impl ModelDownloadProgress {
    pub fn new(selector: &ModelSelector, progress: u8) -> Self {
        Self {
            model_id: selector.model_id.clone(),
            parameter_size: selector.parameter_size.clone(),
            progress: progress.min(100),
        }
    }

    pub fn selector(&self) -> ModelSelector {
        ModelSelector::new(&self.model_id, &self.parameter_size)
    }
}

impl From<(String, String, u8)> for ModelDownloadProgress {
    fn from((model_id, parameter_size, progress): (String, String, u8)) -> Self {
        Self {
            model_id,
            parameter_size,
            progress,
        }
    }
}

impl From<ModelDownloadProgress> for (String, String, u8) {
    fn from(event: ModelDownloadProgress) -> Self {
        (event.model_id, event.parameter_size, event.progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct ChatMessageChunk {
    pub message_id: String,
    pub fragment: String,
}

impl ChatMessageChunk {
    pub fn new(message_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            fragment: fragment.into(),
        }
    }
}

impl From<(String, String)> for ChatMessageChunk {
    fn from((message_id, fragment): (String, String)) -> Self {
        Self {
            message_id,
            fragment,
        }
    }
}

impl From<ChatMessageChunk> for (String, String) {
    fn from(event: ChatMessageChunk) -> Self {
        (event.message_id, event.fragment)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    ModelDownloadProgress(ModelDownloadProgress),
    ChatMessageChunk(ChatMessageChunk),
}

impl BackendEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            BackendEvent::ModelDownloadProgress(_) => MODEL_DOWNLOAD_PROGRESS,
            BackendEvent::ChatMessageChunk(_) => CHAT_MESSAGE_CHUNK,
        }
    }
}

/// Where backend commands publish their push events.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: BackendEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: BackendEvent) {
        (**self).emit(event)
    }
}

/// In-process event channel. Every listener sees every event emitted after it subscribed.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BackendEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.sender.subscribe()
    }

    /// Run `handler` for each event until the returned [`Subscription`] is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(BackendEvent) + Send + 'static,
    {
        // Subscribe before spawning so nothing emitted after this call is missed
        let mut receiver = self.sender.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => handler(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event listener lagged, {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription { task }
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: BackendEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event emitted with no listeners");
        }
    }
}

/// Handle for an [`EventBus::listen`] registration. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
