//! Composition root. One [`AppContext`] is built per application lifetime and
//! handed to whatever drives the UI.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::chat::{Chat, ChatController, ChatHistory, ChatSession, WELCOME_MESSAGE};
use crate::config::{AppConfig, ConfigKey, ConfigStore, FileConfigStore, ModelConfig};
use crate::error::Error;
use crate::events::{BackendEvent, EventBus, Subscription};
use crate::llm::{Backend, OllamaProbe, OllamaService};
use crate::models::{HealthIntervals, HealthMonitor, HealthProbe, ModelSelector, ModelStore};
use crate::notifications::Notifications;

pub type OllamaContext<C> = AppContext<OllamaService<EventBus>, C>;

pub struct AppContext<B, C> {
    events: EventBus,
    notifications: Notifications,
    config: Arc<C>,
    models: Arc<ModelStore<B>>,
    chat: Arc<ChatController<B>>,
    history: Mutex<ChatHistory>,
    health: CancellationToken,
    _progress: Subscription,
}

impl<B: Backend, C: ConfigStore> AppContext<B, C> {
    /// Wire stores to `backend`, which must publish its events on `events`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(backend: Arc<B>, events: EventBus, config: Arc<C>) -> Self {
        let notifications = Notifications::new();
        let models = Arc::new(ModelStore::new(backend.clone(), notifications.clone()));
        let chat = Arc::new(ChatController::new(
            backend,
            &events,
            ChatSession::with_welcome(WELCOME_MESSAGE),
        ));

        let restored = config
            .get(&ConfigKey::MODEL)
            .and_then(|c: ModelConfig| c.active_model);
        models.restore_active_model(restored.clone());
        chat.set_active_model(restored);

        let store = config.clone();
        let chat_ref = chat.clone();
        models.on_active_model_change(move |selector| {
            chat_ref.set_active_model(selector.cloned());
            let model_config = ModelConfig {
                active_model: selector.cloned(),
            };
            if let Err(e) = store.set(&ConfigKey::MODEL, model_config) {
                error!("Failed to save model config: {}", e);
            }
        });

        let target = models.clone();
        let progress = events.listen(move |event| {
            if let BackendEvent::ModelDownloadProgress(progress) = event {
                target.apply_progress(&progress);
            }
        });

        Self {
            events,
            notifications,
            config,
            models,
            chat,
            history: Mutex::new(ChatHistory::default()),
            health: CancellationToken::new(),
            _progress: progress,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn config(&self) -> &Arc<C> {
        &self.config
    }

    pub fn models(&self) -> &Arc<ModelStore<B>> {
        &self.models
    }

    pub fn chat(&self) -> &ChatController<B> {
        &self.chat
    }

    /// Start polling `probe`. Stops on [`AppContext::shutdown`] or drop.
    pub fn start_health_monitor<P: HealthProbe>(&self, probe: Arc<P>, intervals: HealthIntervals) {
        HealthMonitor::new(probe, self.models.clone(), intervals).spawn(self.health.child_token());
    }

    pub fn shutdown(&self) {
        self.health.cancel();
    }

    /// Select the chat model from a picker value; an empty value clears it.
    pub fn select_model(&self, value: &str) -> Result<(), Error> {
        let selector = match value.trim() {
            "" => None,
            value => Some(value.parse::<ModelSelector>()?),
        };
        self.models.set_active_model(selector)?;
        Ok(())
    }

    pub async fn download_model(&self, value: &str) -> Result<(), Error> {
        let selector: ModelSelector = value.parse()?;
        self.models.download_model(&selector).await?;
        Ok(())
    }

    pub async fn delete_model(&self, value: &str) -> Result<(), Error> {
        let selector: ModelSelector = value.parse()?;
        self.models.delete_model(&selector).await?;
        Ok(())
    }

    /// Type `text` into the chat input and send it.
    pub async fn submit(&self, text: &str) -> Result<(), Error> {
        self.chat.set_input(text);
        self.chat.send().await?;
        Ok(())
    }

    pub fn create_chat(&self) -> Chat {
        self.history.lock().unwrap().create()
    }

    pub fn delete_chat(&self, id: &str) -> bool {
        self.history.lock().unwrap().delete(id)
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.history.lock().unwrap().list().to_vec()
    }
}

impl<C: ConfigStore> OllamaContext<C> {
    /// Build against the Ollama instance named in the stored [`AppConfig`] and
    /// start the health monitor.
    pub fn with_ollama(config: Arc<C>) -> Result<Self, Error> {
        let app_config: AppConfig = config.get(&ConfigKey::APP).unwrap_or_default();
        let endpoint = app_config.ollama_endpoint()?;
        info!("Using Ollama at {}", endpoint.url());

        let events = EventBus::new();
        let service = OllamaService::new(
            endpoint.client(),
            app_config.catalog_source(),
            events.clone(),
        );

        let context = Self::new(Arc::new(service), events, config);
        context.start_health_monitor(
            Arc::new(OllamaProbe::new(endpoint)),
            app_config.health_intervals(),
        );
        Ok(context)
    }
}

impl OllamaContext<FileConfigStore> {
    /// Open with a JSON config file at `config_path`.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self, Error> {
        let config = FileConfigStore::open(config_path)?;
        Self::with_ollama(Arc::new(config))
    }
}

impl<B, C> Drop for AppContext<B, C> {
    fn drop(&mut self) {
        self.health.cancel();
    }
}
