use std::future::Future;

use ollama_rs::models::LocalModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::catalog::{CatalogError, Model};
use crate::chat::{ChatMessage, Role};
use crate::models::{mark_downloaded, ModelSelector};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Ollama error: {0}")]
    Ollama(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("Model {0} is not in the catalog")]
    UnknownVariant(ModelSelector),
    #[error("{0}")]
    Rejected(String),
}

/// A locally installed model as reported by the model service.
///
/// `name` is `"<modelId>:<parameterSize>"`; the rest is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedModel {
    pub name: String,
    pub modified_at: String,
    pub size: u64,
}

impl DownloadedModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified_at: String::new(),
            size: 0,
        }
    }
}

impl From<LocalModel> for DownloadedModel {
    fn from(model: LocalModel) -> Self {
        Self {
            name: model.name,
            modified_at: model.modified_at,
            size: model.size,
        }
    }
}

/// One history entry sent along with a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessage> for MessagePayload {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Arguments of the `send_message` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub model_id: String,
    pub parameter_size: String,
    /// Correlation id; every streamed chunk for this request carries it.
    pub message_id: String,
    pub messages: Vec<MessagePayload>,
}

/// Final, authoritative reply to a `send_message` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub role: Role,
    pub content: String,
}

/// The native command surface the UI state talks to.
///
/// One method per backend command. Progress and chat fragments are not part
/// of the return values; implementations push them out-of-band through an
/// [`crate::events::EventSink`].
pub trait Backend: Send + Sync + 'static {
    /// The full catalog of models that can be downloaded.
    fn list_available_models(
        &self,
    ) -> impl Future<Output = Result<Vec<Model>, BackendError>> + Send;

    /// Models present in the local store.
    fn list_downloaded_models(
        &self,
    ) -> impl Future<Output = Result<Vec<DownloadedModel>, BackendError>> + Send;

    /// Download a variant. Resolves when the download has finished.
    fn download_model(
        &self,
        selector: &ModelSelector,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn delete_model(
        &self,
        selector: &ModelSelector,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Run a chat completion, streaming fragments tagged with `request.message_id`.
    fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> impl Future<Output = Result<ChatReply, BackendError>> + Send;

    /// Catalog with each variant's `downloaded` flag filled in.
    fn list_models(&self) -> impl Future<Output = Result<Vec<Model>, BackendError>> + Send {
        async move {
            let available = self.list_available_models().await?;
            let downloaded = self.list_downloaded_models().await?;
            Ok(mark_downloaded(available, &downloaded))
        }
    }
}
