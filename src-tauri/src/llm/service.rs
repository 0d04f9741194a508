//! Backend implementation backed by a local Ollama service.

use std::fmt::Display;

use futures_util::{Stream, StreamExt};
use log::{debug, error, info};
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::chat::{ChatMessage as OllamaMessage, ChatMessageResponse, MessageRole};
use ollama_rs::models::pull::PullModelStatus;
use ollama_rs::Ollama;

use super::backend::{Backend, BackendError, ChatReply, DownloadedModel, SendMessageRequest};
use super::catalog::{find_model, CatalogSource, Model};
use crate::chat::Role;
use crate::events::{BackendEvent, ChatMessageChunk, EventSink, ModelDownloadProgress};
use crate::models::ModelSelector;

/// Final status line of a successful pull.
const PULL_SUCCESS: &str = "success";

/// Turns Ollama's per-layer byte counts into an overall percentage that only
/// ever goes up. 100 is held back until the pull has actually succeeded.
#[derive(Debug, Default)]
struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    /// Returns the percentage to report, or `None` if it would not increase.
    fn observe(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(99);
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

/// Percentage of the layer currently being transferred, if Ollama sent byte counts.
fn layer_percent(status: &PullModelStatus) -> Option<u8> {
    match (status.total, status.completed) {
        (Some(total), Some(completed)) if total > 0 => {
            Some((completed.min(total) * 100 / total) as u8)
        }
        _ => None,
    }
}

pub struct OllamaService<E> {
    ollama: Ollama,
    catalog: CatalogSource,
    events: E,
}

impl<E: EventSink> OllamaService<E> {
    pub fn new(ollama: Ollama, catalog: CatalogSource, events: E) -> Self {
        Self {
            ollama,
            catalog,
            events,
        }
    }

    async fn catalog_entry(&self, selector: &ModelSelector) -> Result<Model, BackendError> {
        let catalog = self.catalog.load().await?;
        find_model(&catalog, &selector.model_id)
            .filter(|model| model.has_variant(&selector.parameter_size))
            .cloned()
            .ok_or_else(|| BackendError::UnknownVariant(selector.clone()))
    }

    fn emit_progress(&self, selector: &ModelSelector, percent: u8) {
        self.events
            .emit(BackendEvent::ModelDownloadProgress(ModelDownloadProgress::new(
                selector, percent,
            )));
    }

    /// Report pull progress until Ollama says the pull succeeded.
    async fn track_pull<S, Err>(
        &self,
        selector: &ModelSelector,
        mut stream: S,
    ) -> Result<(), BackendError>
    where
        S: Stream<Item = Result<PullModelStatus, Err>> + Unpin,
        Err: Display,
    {
        let mut tracker = ProgressTracker::default();

        while let Some(status) = stream.next().await {
            let status = status.map_err(|e| BackendError::Ollama(e.to_string()))?;
            if status.message == PULL_SUCCESS {
                self.emit_progress(selector, 100);
                return Ok(());
            }
            if let Some(percent) = layer_percent(&status).and_then(|p| tracker.observe(p)) {
                self.emit_progress(selector, percent);
            }
        }

        Err(BackendError::Ollama(format!(
            "pull of {} ended before it succeeded",
            selector
        )))
    }

    /// Forward non-empty fragments under `message_id` and return the full reply.
    async fn relay_chat<S, Err>(
        &self,
        message_id: &str,
        mut stream: S,
    ) -> Result<String, BackendError>
    where
        S: Stream<Item = Result<ChatMessageResponse, Err>> + Unpin,
    {
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|_| BackendError::Ollama("chat stream was interrupted".to_string()))?;
            if let Some(message) = chunk.message {
                if !message.content.is_empty() {
                    self.events
                        .emit(BackendEvent::ChatMessageChunk(ChatMessageChunk::new(
                            message_id,
                            message.content.as_str(),
                        )));
                    content.push_str(&message.content);
                }
            }
            if chunk.done {
                break;
            }
        }

        Ok(content)
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

impl<E: EventSink> Backend for OllamaService<E> {
    async fn list_available_models(&self) -> Result<Vec<Model>, BackendError> {
        self.catalog.load().await.map_err(|e| {
            error!("Failed to load model catalog: {}", e);
            e.into()
        })
    }

    async fn list_downloaded_models(&self) -> Result<Vec<DownloadedModel>, BackendError> {
        let models = self.ollama.list_local_models().await.map_err(|e| {
            error!("Failed to list downloaded models: {}", e);
            BackendError::Ollama(e.to_string())
        })?;
        Ok(models.into_iter().map(DownloadedModel::from).collect())
    }

    async fn download_model(&self, selector: &ModelSelector) -> Result<(), BackendError> {
        let model = self.catalog_entry(selector).await?;
        info!("Downloading {} ({})", model.name, selector.parameter_size);

        let result = match self.ollama.pull_model_stream(selector.to_string(), false).await {
            Ok(stream) => self.track_pull(selector, stream).await,
            Err(e) => Err(BackendError::Ollama(e.to_string())),
        };
        if let Err(e) = &result {
            error!("Failed to download model {}: {}", selector, e);
        }
        result
    }

    async fn delete_model(&self, selector: &ModelSelector) -> Result<(), BackendError> {
        self.ollama
            .delete_model(selector.to_string())
            .await
            .map_err(|e| {
                error!("Failed to delete model {}: {}", selector, e);
                BackendError::Ollama(e.to_string())
            })
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<ChatReply, BackendError> {
        let model = format!("{}:{}", request.model_id, request.parameter_size);
        let messages = request
            .messages
            .iter()
            .map(|m| OllamaMessage::new(m.role.into(), m.content.clone()))
            .collect();
        let message_id = request.message_id;

        let result = match self
            .ollama
            .send_chat_messages_stream(ChatMessageRequest::new(model, messages))
            .await
        {
            Ok(stream) => self.relay_chat(&message_id, stream).await,
            Err(e) => Err(BackendError::Ollama(e.to_string())),
        };
        let content = result.map_err(|e| {
            error!("Failed to send message {}: {}", message_id, e);
            e
        })?;

        debug!("Message {} answered", message_id);
        Ok(ChatReply {
            role: Role::Assistant,
            content,
        })
    }
}
