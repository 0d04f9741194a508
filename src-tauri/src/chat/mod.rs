mod composer;
mod controller;
mod history;
mod message;
mod session;

pub use composer::{Composer, ComposerAction, Key, KeyPress};
pub use controller::ChatController;
pub use history::{Chat, ChatHistory, NEW_CHAT_TITLE};
pub use message::{ChatMessage, Role};
pub use session::{
    ChatError, ChatPhase, ChatSession, PendingSend, SEND_ERROR_MESSAGE, WELCOME_MESSAGE,
};
