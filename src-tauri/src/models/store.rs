//! Client-side model state: catalog, per-variant download states, the active
//! model selection and whether the model service is reachable.
//!
//! Every operation takes the state lock only between awaits, so backend calls
//! never run with the lock held.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use super::download_state::{DownloadState, DownloadStates};
use super::reconcile::{reconcile, OrphanedDownload};
use super::selector::ModelSelector;
use crate::events::ModelDownloadProgress;
use crate::llm::{find_model, Backend, BackendError, Model};
use crate::notifications::Notifications;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model service is not running")]
    ServiceNotRunning,
    #[error("Model {0} is not in the catalog")]
    NotInCatalog(ModelSelector),
    #[error("Model {0} is not downloaded")]
    NotDownloaded(ModelSelector),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Called whenever the active model changes through a user action or a delete.
pub type ActiveModelListener = Box<dyn Fn(Option<&ModelSelector>) + Send + Sync>;

/// One entry of the active-model picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveModelOption {
    pub value: ModelSelector,
    pub label: String,
}

#[derive(Default)]
struct StoreState {
    catalog: Vec<Model>,
    download_states: DownloadStates,
    /// Downloads started through this store that have not resolved yet
    in_flight: HashSet<ModelSelector>,
    active_model: Option<ModelSelector>,
    service_running: bool,
    /// Bumped on every local change to a download state
    generation: u64,
    /// Generation of the last local change per variant
    touched: HashMap<ModelSelector, u64>,
}

impl StoreState {
    fn touch(&mut self, selector: &ModelSelector) {
        self.generation += 1;
        self.touched.insert(selector.clone(), self.generation);
    }

    fn touched_since(&self, generation: u64) -> Vec<ModelSelector> {
        self.touched
            .iter()
            .filter(|(_, touched)| **touched > generation)
            .map(|(selector, _)| selector.clone())
            .collect()
    }

    fn in_catalog(&self, selector: &ModelSelector) -> bool {
        find_model(&self.catalog, &selector.model_id)
            .is_some_and(|model| model.has_variant(&selector.parameter_size))
    }

    fn display_name(&self, selector: &ModelSelector) -> String {
        match find_model(&self.catalog, &selector.model_id) {
            Some(model) => format!("{} ({})", model.name, selector.parameter_size.to_uppercase()),
            None => selector.to_string(),
        }
    }
}

pub struct ModelStore<B> {
    backend: Arc<B>,
    notifications: Notifications,
    state: Mutex<StoreState>,
    active_model_listener: Mutex<Option<ActiveModelListener>>,
}

impl<B: Backend> ModelStore<B> {
    pub fn new(backend: Arc<B>, notifications: Notifications) -> Self {
        Self {
            backend,
            notifications,
            state: Mutex::new(StoreState::default()),
            active_model_listener: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn on_active_model_change<F>(&self, listener: F)
    where
        F: Fn(Option<&ModelSelector>) + Send + Sync + 'static,
    {
        *self.active_model_listener.lock().unwrap() = Some(Box::new(listener));
    }

    // ===== Snapshots =====

    pub fn catalog(&self) -> Vec<Model> {
        self.state.lock().unwrap().catalog.clone()
    }

    pub fn download_states(&self) -> DownloadStates {
        self.state.lock().unwrap().download_states.clone()
    }

    pub fn download_state(&self, selector: &ModelSelector) -> Option<DownloadState> {
        self.state
            .lock()
            .unwrap()
            .download_states
            .get(selector)
            .copied()
    }

    pub fn active_model(&self) -> Option<ModelSelector> {
        self.state.lock().unwrap().active_model.clone()
    }

    pub fn is_service_running(&self) -> bool {
        self.state.lock().unwrap().service_running
    }

    /// Returns the previous value.
    pub fn set_service_running(&self, running: bool) -> bool {
        std::mem::replace(&mut self.state.lock().unwrap().service_running, running)
    }

    // ===== Reconciliation =====

    /// Rebuild catalog and download states from the backend.
    ///
    /// Entries for downloads still in flight survive the rebuild unless the
    /// backend already lists them as downloaded. Variants downloaded, deleted
    /// or updated while the backend was being queried keep their live state.
    /// Returns the orphaned downloads.
    pub async fn refresh(&self) -> Result<Vec<OrphanedDownload>, ModelError> {
        let started = {
            let state = self.state.lock().unwrap();
            if !state.service_running {
                return Err(ModelError::ServiceNotRunning);
            }
            state.generation
        };

        let (available, downloaded) = tokio::join!(
            self.backend.list_available_models(),
            self.backend.list_downloaded_models()
        );
        let (available, downloaded) = match (available, downloaded) {
            (Ok(available), Ok(downloaded)) => (available, downloaded),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to fetch models: {}", e);
                self.notifications.error(format!("Failed to fetch models: {}", e));
                return Err(e.into());
            }
        };

        let mut rebuilt = reconcile(&available, &downloaded);

        let mut state = self.state.lock().unwrap();
        state.catalog = available;
        for selector in state.touched_since(started) {
            match state.download_states.get(&selector).copied() {
                Some(live) if state.in_catalog(&selector) => {
                    rebuilt.states.insert(selector, live);
                }
                _ => {
                    rebuilt.states.remove(&selector);
                }
            }
        }
        for selector in &state.in_flight {
            if rebuilt.states.contains_key(selector) || !state.in_catalog(selector) {
                continue;
            }
            if let Some(live) = state.download_states.get(selector) {
                rebuilt.states.insert(selector.clone(), *live);
            }
        }
        state.download_states = rebuilt.states;

        info!(
            "Models refreshed: {} in catalog, {} downloaded, {} orphaned",
            state.catalog.len(),
            state.download_states.values().filter(|s| s.downloaded).count(),
            rebuilt.orphans.len()
        );

        // A selection restored from disk may point at a model removed outside the app
        let active_is_stale = state.active_model.as_ref().is_some_and(|selector| {
            !state
                .download_states
                .get(selector)
                .is_some_and(|s| s.downloaded)
        });
        let stale_active = if active_is_stale {
            state.active_model.take()
        } else {
            None
        };
        drop(state);

        if let Some(selector) = stale_active {
            warn!("Active model {} is no longer downloaded, clearing selection", selector);
            self.notify_active_model(None);
        }

        Ok(rebuilt.orphans)
    }

    /// Apply a live `model-download-progress` event.
    pub fn apply_progress(&self, event: &ModelDownloadProgress) {
        let selector = event.selector();
        let mut state = self.state.lock().unwrap();

        if !state.in_catalog(&selector) {
            warn!(
                "Download progress for {} ({}) which is not in the catalog",
                selector.model_id, selector.parameter_size
            );
            return;
        }

        // Stragglers from a download that already resolved or was deleted
        if !state.in_flight.contains(&selector) {
            debug!("Ignoring stale progress {}% for {}", event.progress, selector);
            return;
        }

        state.touch(&selector);
        state
            .download_states
            .insert(selector, DownloadState::from_progress(event.progress));
    }

    // ===== Commands =====

    /// Download a catalog variant. The entry is marked started before the
    /// backend call and rolled back if the call fails.
    pub async fn download_model(&self, selector: &ModelSelector) -> Result<(), ModelError> {
        let name = {
            let mut state = self.state.lock().unwrap();
            if !state.in_catalog(selector) {
                return Err(ModelError::NotInCatalog(selector.clone()));
            }
            state
                .download_states
                .insert(selector.clone(), DownloadState::STARTED);
            state.in_flight.insert(selector.clone());
            state.touch(selector);
            state.display_name(selector)
        };

        info!("Downloading model {}", selector);
        let result = self.backend.download_model(selector).await;

        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(selector);
        state.touch(selector);

        match result {
            Ok(()) => {
                state
                    .download_states
                    .insert(selector.clone(), DownloadState::COMPLETE);
                drop(state);
                info!("Model {} downloaded", selector);
                self.notifications
                    .success(format!("{} downloaded successfully", name));
                Ok(())
            }
            Err(e) => {
                state.download_states.remove(selector);
                drop(state);
                error!("Failed to download model {}: {}", selector, e);
                self.notifications
                    .error(format!("Failed to download {}: {}", name, e));
                Err(e.into())
            }
        }
    }

    /// Delete a downloaded variant, clearing the active model if it was this one.
    pub async fn delete_model(&self, selector: &ModelSelector) -> Result<(), ModelError> {
        if let Err(e) = self.backend.delete_model(selector).await {
            error!("Failed to delete model {}: {}", selector, e);
            self.notifications
                .error(format!("Failed to delete {}: {}", selector, e));
            return Err(e.into());
        }

        let cleared = {
            let mut state = self.state.lock().unwrap();
            state.download_states.remove(selector);
            state.touch(selector);
            if state.active_model.as_ref() == Some(selector) {
                state.active_model = None;
                true
            } else {
                false
            }
        };

        info!("Model {} deleted", selector);
        if cleared {
            info!("Active model {} was deleted, clearing selection", selector);
            self.notify_active_model(None);
        }
        Ok(())
    }

    // ===== Active model =====

    /// Select the model used for chat. Only downloaded variants can be selected.
    pub fn set_active_model(&self, selector: Option<ModelSelector>) -> Result<(), ModelError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(selector) = &selector {
                let downloaded = state
                    .download_states
                    .get(selector)
                    .is_some_and(|s| s.downloaded);
                if !downloaded {
                    return Err(ModelError::NotDownloaded(selector.clone()));
                }
            }
            state.active_model = selector.clone();
        }

        self.notify_active_model(selector.as_ref());
        Ok(())
    }

    /// Put back a persisted selection at startup, before the first refresh.
    pub fn restore_active_model(&self, selector: Option<ModelSelector>) {
        if let Some(selector) = &selector {
            debug!("Restoring active model {}", selector);
        }
        self.state.lock().unwrap().active_model = selector;
    }

    /// Downloaded variants in catalog order, labelled `"<name> (<SIZE>)"`.
    pub fn active_model_options(&self) -> Vec<ActiveModelOption> {
        let state = self.state.lock().unwrap();

        state
            .catalog
            .iter()
            .flat_map(|model| {
                model
                    .variants
                    .iter()
                    .map(move |variant| ModelSelector::new(&model.id, &variant.parameter_size))
            })
            .filter(|selector| {
                state
                    .download_states
                    .get(selector)
                    .is_some_and(|s| s.downloaded)
            })
            .map(|selector| ActiveModelOption {
                label: state.display_name(&selector),
                value: selector,
            })
            .collect()
    }

    fn notify_active_model(&self, selector: Option<&ModelSelector>) {
        if let Some(listener) = self.active_model_listener.lock().unwrap().as_ref() {
            listener(selector);
        }
    }
}
