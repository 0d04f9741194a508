mod backend;
mod catalog;
mod ollama;
mod service;

pub use backend::{
    Backend, BackendError, ChatReply, DownloadedModel, MessagePayload, SendMessageRequest,
};
pub use catalog::{
    find_model, CatalogError, CatalogSource, Model, ModelAuthor, ModelVariant, BUNDLED_CATALOG,
};
pub use ollama::{EndpointError, OllamaEndpoint, OllamaProbe, DEFAULT_OLLAMA_URL};
pub use service::OllamaService;
