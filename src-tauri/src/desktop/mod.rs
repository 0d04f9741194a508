//! Tauri shell: command handlers, the webview event bridge and app setup.
//!
//! The host binary runs the app with
//! `codus_lib::desktop::builder().run(tauri::generate_context!())`.

pub mod commands;
mod registry;

use std::sync::Arc;

use log::{error, info, warn};
use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_store::StoreExt;
use tokio::sync::broadcast::error::RecvError;

use crate::config::TauriConfigStore;
use crate::context::OllamaContext;
use crate::events::{BackendEvent, EventSink, Subscription};

pub const NOTIFICATION: &str = "notification";

/// Forwards backend events to the webview
pub struct TauriEventSink {
    app: AppHandle,
}

impl TauriEventSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl EventSink for TauriEventSink {
    fn emit(&self, event: BackendEvent) {
        let name = event.name();
        let result = match event {
            BackendEvent::ModelDownloadProgress(progress) => self.app.emit(name, progress),
            BackendEvent::ChatMessageChunk(chunk) => self.app.emit(name, chunk),
        };
        if let Err(e) = result {
            error!("Failed to emit {} event: {}", name, e);
        }
    }
}

/// Managed state shared by all commands
pub struct DesktopState {
    pub context: OllamaContext<TauriConfigStore>,
    _bridge: Subscription,
}

pub fn builder() -> tauri::Builder<tauri::Wry> {
    tauri::Builder::default()
        .plugin(crate::log::create_plugin().build())
        .plugin(tauri_plugin_store::Builder::new().build())
        .setup(setup_app)
        .invoke_handler(crate::with_commands!(tauri::generate_handler))
}

fn setup_app(app: &mut tauri::App<tauri::Wry>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Codus v{}", env!("CARGO_PKG_VERSION"));

    let store = app.store("config.json")?;
    let config = Arc::new(TauriConfigStore::new(store));
    let handle = app.handle().clone();

    // Listeners and the health monitor spawn onto Tauri's Tokio runtime
    let state = tauri::async_runtime::block_on(async move {
        let context = OllamaContext::with_ollama(config)?;

        let sink = TauriEventSink::new(handle.clone());
        let bridge = context.events().listen(move |event| sink.emit(event));

        let mut notifications = context.notifications().subscribe();
        tauri::async_runtime::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(notification) => {
                        if let Err(e) = handle.emit(NOTIFICATION, notification) {
                            error!("Failed to emit notification: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Notification bridge lagged, {} dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok::<_, crate::Error>(DesktopState {
            context,
            _bridge: bridge,
        })
    })?;

    app.manage(state);
    Ok(())
}
