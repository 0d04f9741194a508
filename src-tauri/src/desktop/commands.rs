use log::error;
use tauri::State;

use super::DesktopState;
use crate::chat::Chat;
use crate::config::{AppConfig, ConfigKey, ConfigStore};
use crate::llm::{Backend, ChatReply, DownloadedModel, MessagePayload, Model, SendMessageRequest};
use crate::models::{ActiveModelOption, ModelSelector};

// ===== MODEL CATALOG COMMANDS =====

/// Catalog with each variant's `downloaded` flag filled in
#[tauri::command]
pub async fn list_models(state: State<'_, DesktopState>) -> Result<Vec<Model>, String> {
    state
        .context
        .models()
        .backend()
        .list_models()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_available_models(state: State<'_, DesktopState>) -> Result<Vec<Model>, String> {
    state
        .context
        .models()
        .backend()
        .list_available_models()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn list_downloaded_models(
    state: State<'_, DesktopState>,
) -> Result<Vec<DownloadedModel>, String> {
    state
        .context
        .models()
        .backend()
        .list_downloaded_models()
        .await
        .map_err(|e| e.to_string())
}

/// Download a variant; progress arrives as `model-download-progress` events
#[tauri::command]
pub async fn download_model(
    state: State<'_, DesktopState>,
    model_id: String,
    parameter_size: String,
) -> Result<(), String> {
    let selector = ModelSelector::new(model_id, parameter_size);
    state
        .context
        .models()
        .download_model(&selector)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_model(
    state: State<'_, DesktopState>,
    model_id: String,
    parameter_size: String,
) -> Result<(), String> {
    let selector = ModelSelector::new(model_id, parameter_size);
    state
        .context
        .models()
        .delete_model(&selector)
        .await
        .map_err(|e| e.to_string())
}

// ===== ACTIVE MODEL COMMANDS =====

#[tauri::command]
pub fn get_active_model(state: State<'_, DesktopState>) -> Option<ModelSelector> {
    state.context.models().active_model()
}

/// Select the chat model; an empty string clears the selection
#[tauri::command]
pub fn set_active_model(state: State<'_, DesktopState>, value: String) -> Result<(), String> {
    state.context.select_model(&value).map_err(|e| {
        error!("Failed to set active model '{}': {}", value, e);
        e.to_string()
    })
}

#[tauri::command]
pub fn list_active_model_options(state: State<'_, DesktopState>) -> Vec<ActiveModelOption> {
    state.context.models().active_model_options()
}

#[tauri::command]
pub fn is_service_running(state: State<'_, DesktopState>) -> bool {
    state.context.models().is_service_running()
}

// ===== CHAT COMMANDS =====

/// Run a chat completion; fragments arrive as `chat-message-chunk` events
/// tagged with `message_id`
#[tauri::command]
pub async fn send_message(
    state: State<'_, DesktopState>,
    model_id: String,
    parameter_size: String,
    message_id: String,
    messages: Vec<MessagePayload>,
) -> Result<ChatReply, String> {
    let request = SendMessageRequest {
        model_id,
        parameter_size,
        message_id,
        messages,
    };
    state
        .context
        .models()
        .backend()
        .send_message(request)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn create_chat(state: State<'_, DesktopState>) -> Chat {
    state.context.create_chat()
}

#[tauri::command]
pub fn delete_chat(state: State<'_, DesktopState>, chat_id: String) -> bool {
    state.context.delete_chat(&chat_id)
}

#[tauri::command]
pub fn list_chats(state: State<'_, DesktopState>) -> Vec<Chat> {
    state.context.chats()
}

// ===== APP CONFIGURATION COMMANDS =====

#[tauri::command]
pub fn load_app_config(state: State<'_, DesktopState>) -> AppConfig {
    state.context.config().get(&ConfigKey::APP).unwrap_or_default()
}
