//! Native side of the Codus desktop app: local model management and chat
//! against an Ollama service, plus the client state the UI renders.

pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod llm;
pub mod models;
pub mod notifications;

#[cfg(feature = "desktop")]
pub mod desktop;
#[cfg(feature = "desktop")]
mod log;

#[cfg(test)]
mod testing;

pub use context::{AppContext, OllamaContext};
pub use error::Error;
