use derive_more::{Display, From};

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Config(crate::config::ConfigError),

    #[from]
    Selector(crate::models::SelectorError),

    #[from]
    Model(crate::models::ModelError),

    #[from]
    Chat(crate::chat::ChatError),

    #[cfg(feature = "desktop")]
    #[from]
    Tauri(tauri::Error),
}

impl std::error::Error for Error {}
