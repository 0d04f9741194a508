//! In-process backend used by unit tests.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::chat::Role;
use crate::events::{BackendEvent, ChatMessageChunk, EventBus, EventSink, ModelDownloadProgress};
use crate::llm::{
    Backend, BackendError, ChatReply, DownloadedModel, Model, ModelAuthor, ModelVariant,
    SendMessageRequest,
};
use crate::models::ModelSelector;

pub fn catalog_model(id: &str, name: &str, sizes: &[&str]) -> Model {
    Model {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{} test model", name),
        author: ModelAuthor {
            name: "Test".to_string(),
            url: "https://example.com".to_string(),
        },
        variants: sizes
            .iter()
            .map(|size| ModelVariant {
                parameter_size: size.to_string(),
                disk_space: "1GB".to_string(),
                downloaded: false,
            })
            .collect(),
    }
}

/// Scripted backend. Downloads and sends wait on `gate` when one is set.
#[derive(Default)]
pub struct FakeBackend {
    pub events: EventBus,
    pub catalog: Mutex<Vec<Model>>,
    pub downloaded: Mutex<Vec<DownloadedModel>>,
    pub list_error: Mutex<Option<String>>,
    pub download_error: Mutex<Option<String>>,
    pub delete_error: Mutex<Option<String>>,
    pub send_error: Mutex<Option<String>>,
    pub fragments: Mutex<Vec<String>>,
    pub reply: Mutex<String>,
    pub requests: Mutex<Vec<SendMessageRequest>>,
    pub gate: Option<Arc<Notify>>,
    /// Holds `list_downloaded_models` after it has read the installed models
    pub list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn with_catalog(self, catalog: Vec<Model>) -> Self {
        *self.catalog.lock().unwrap() = catalog;
        self
    }

    pub fn with_downloaded(self, names: &[&str]) -> Self {
        *self.downloaded.lock().unwrap() = names.iter().map(|n| DownloadedModel::new(*n)).collect();
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gate_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn ungate_listing(&self) {
        *self.list_gate.lock().unwrap() = None;
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn failure(slot: &Mutex<Option<String>>) -> Result<(), BackendError> {
        match slot.lock().unwrap().clone() {
            Some(message) => Err(BackendError::Rejected(message)),
            None => Ok(()),
        }
    }
}

impl Backend for FakeBackend {
    async fn list_available_models(&self) -> Result<Vec<Model>, BackendError> {
        Self::failure(&self.list_error)?;
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn list_downloaded_models(&self) -> Result<Vec<DownloadedModel>, BackendError> {
        Self::failure(&self.list_error)?;
        let downloaded = self.downloaded.lock().unwrap().clone();
        let gate = self.list_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(downloaded)
    }

    async fn download_model(&self, selector: &ModelSelector) -> Result<(), BackendError> {
        self.events
            .emit(BackendEvent::ModelDownloadProgress(ModelDownloadProgress::new(selector, 50)));
        self.wait_for_gate().await;
        Self::failure(&self.download_error)?;

        self.downloaded
            .lock()
            .unwrap()
            .push(DownloadedModel::new(selector.to_string()));
        self.events
            .emit(BackendEvent::ModelDownloadProgress(ModelDownloadProgress::new(selector, 100)));
        Ok(())
    }

    async fn delete_model(&self, selector: &ModelSelector) -> Result<(), BackendError> {
        Self::failure(&self.delete_error)?;
        let name = selector.to_string();
        self.downloaded.lock().unwrap().retain(|m| m.name != name);
        Ok(())
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<ChatReply, BackendError> {
        let fragments = self.fragments.lock().unwrap().clone();
        for fragment in fragments {
            self.events.emit(BackendEvent::ChatMessageChunk(ChatMessageChunk::new(
                &request.message_id,
                fragment,
            )));
        }
        self.requests.lock().unwrap().push(request);

        self.wait_for_gate().await;
        Self::failure(&self.send_error)?;

        Ok(ChatReply {
            role: Role::Assistant,
            content: self.reply.lock().unwrap().clone(),
        })
    }
}
