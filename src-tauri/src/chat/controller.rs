use std::sync::{Arc, Mutex};

use log::{error, info};

use super::composer::{ComposerAction, KeyPress};
use super::session::{ChatError, ChatPhase, ChatSession};
use super::ChatMessage;
use crate::events::{BackendEvent, EventBus, Subscription};
use crate::llm::Backend;
use crate::models::ModelSelector;

/// Drives a [`ChatSession`] against a backend.
///
/// Listens for `chat-message-chunk` events for as long as the controller
/// lives; dropping it unsubscribes.
pub struct ChatController<B> {
    backend: Arc<B>,
    session: Arc<Mutex<ChatSession>>,
    _chunks: Subscription,
}

impl<B: Backend> ChatController<B> {
    pub fn new(backend: Arc<B>, events: &EventBus, session: ChatSession) -> Self {
        let session = Arc::new(Mutex::new(session));

        let target = session.clone();
        let chunks = events.listen(move |event| {
            if let BackendEvent::ChatMessageChunk(chunk) = event {
                target.lock().unwrap().apply_chunk(&chunk);
            }
        });

        Self {
            backend,
            session,
            _chunks: chunks,
        }
    }

    /// Run `f` against the current session state.
    pub fn with_session<R>(&self, f: impl FnOnce(&ChatSession) -> R) -> R {
        f(&self.session.lock().unwrap())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.with_session(|s| s.messages().to_vec())
    }

    pub fn phase(&self) -> ChatPhase {
        self.with_session(|s| s.phase())
    }

    pub fn can_send(&self) -> bool {
        self.with_session(|s| s.can_send())
    }

    pub fn set_input(&self, input: impl Into<String>) {
        self.session.lock().unwrap().set_input(input);
    }

    pub fn set_active_model(&self, selector: Option<ModelSelector>) {
        self.session.lock().unwrap().set_active_model(selector);
    }

    /// Send the current input. A backend failure is shown in the conversation
    /// and also returned.
    pub async fn send(&self) -> Result<(), ChatError> {
        let pending = self.session.lock().unwrap().begin_send()?;
        let message_id = pending.message_id;

        info!(
            "Sending message {} to {}:{}",
            message_id, pending.request.model_id, pending.request.parameter_size
        );

        match self.backend.send_message(pending.request).await {
            Ok(reply) => {
                self.session
                    .lock()
                    .unwrap()
                    .resolve(&message_id, reply.content);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send message {}: {}", message_id, e);
                self.session.lock().unwrap().fail(&message_id);
                Err(e.into())
            }
        }
    }

    /// Feed a key press to the input box, sending on a plain Enter.
    pub async fn handle_key(&self, press: KeyPress) -> Result<ComposerAction, ChatError> {
        let (action, can_send) = {
            let mut session = self.session.lock().unwrap();
            let action = session.handle_key(press);
            (action, session.can_send())
        };

        match action {
            ComposerAction::Submit if can_send => {
                self.send().await?;
                Ok(ComposerAction::Submit)
            }
            ComposerAction::Submit => Ok(ComposerAction::Ignored),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Key, Role, SEND_ERROR_MESSAGE, WELCOME_MESSAGE};
    use crate::events::{ChatMessageChunk, EventSink};
    use crate::testing::FakeBackend;
    use tokio::sync::Notify;

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn controller(backend: FakeBackend) -> (Arc<FakeBackend>, ChatController<FakeBackend>) {
        let backend = Arc::new(backend);
        let events = backend.events.clone();
        let mut session = ChatSession::with_welcome(WELCOME_MESSAGE);
        session.set_active_model(Some(ModelSelector::new("m1", "7b")));
        let controller = ChatController::new(backend.clone(), &events, session);
        (backend, controller)
    }

    #[tokio::test]
    async fn test_streamed_fragments_then_final_reply() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend::new(EventBus::new()).with_gate(gate.clone());
        *backend.fragments.lock().unwrap() = vec!["Hel".into(), "lo".into()];
        *backend.reply.lock().unwrap() = "Hello!".into();
        let (backend, controller) = controller(backend);
        controller.set_input("hi");

        let (result, ()) = tokio::join!(controller.send(), async {
            settle().await;
            let messages = controller.messages();
            assert_eq!(messages.len(), 3);
            assert_eq!(messages[1].role, Role::User);
            assert_eq!(messages[2].content, "Hello");
            assert_eq!(controller.phase(), ChatPhase::Streaming);
            assert!(!controller.can_send());
            gate.notify_one();
        });

        result.unwrap();
        let messages = controller.messages();
        assert_eq!(messages[2].content, "Hello!");
        assert_eq!(controller.phase(), ChatPhase::Resolved);

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message_id, messages[2].id);
    }

    #[tokio::test]
    async fn test_reply_without_fragments() {
        let backend = FakeBackend::new(EventBus::new());
        *backend.reply.lock().unwrap() = "Single shot".into();
        let (_, controller) = controller(backend);
        controller.set_input("hi");

        controller.send().await.unwrap();

        assert_eq!(controller.messages()[2].content, "Single shot");
    }

    #[tokio::test]
    async fn test_failure_is_shown_inline() {
        let backend = FakeBackend::new(EventBus::new());
        *backend.send_error.lock().unwrap() = Some("model not loaded".into());
        let (_, controller) = controller(backend);
        controller.set_input("hi");

        let result = controller.send().await;

        assert!(matches!(result, Err(ChatError::Backend(_))));
        assert_eq!(controller.messages()[2].content, SEND_ERROR_MESSAGE);
        assert_eq!(controller.phase(), ChatPhase::Failed);
        controller.set_input("again");
        assert!(controller.can_send());
    }

    #[tokio::test]
    async fn test_late_chunks_from_previous_request_are_ignored() {
        let backend = FakeBackend::new(EventBus::new());
        *backend.reply.lock().unwrap() = "first".into();
        let (backend, controller) = controller(backend);
        controller.set_input("one");
        controller.send().await.unwrap();
        let first_id = controller.messages()[2].id.clone();

        backend
            .events
            .emit(BackendEvent::ChatMessageChunk(ChatMessageChunk::new(&first_id, " late")));
        settle().await;

        assert_eq!(controller.messages()[2].content, "first");
    }

    #[tokio::test]
    async fn test_enter_sends_and_shift_enter_does_not() {
        let backend = FakeBackend::new(EventBus::new());
        *backend.reply.lock().unwrap() = "ok".into();
        let (backend, controller) = controller(backend);

        for c in "hi".chars() {
            controller.handle_key(KeyPress::new(Key::Char(c))).await.unwrap();
        }
        let action = controller
            .handle_key(KeyPress::with_shift(Key::Enter))
            .await
            .unwrap();
        assert_eq!(action, ComposerAction::Edited);
        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(controller.with_session(|s| s.input().to_string()), "hi\n");

        let action = controller.handle_key(KeyPress::new(Key::Enter)).await.unwrap();
        assert_eq!(action, ComposerAction::Submit);
        assert_eq!(backend.requests.lock().unwrap().len(), 1);
        assert_eq!(controller.messages()[1].content, "hi");
    }

    #[tokio::test]
    async fn test_enter_with_blank_input_is_ignored() {
        let (backend, controller) = controller(FakeBackend::new(EventBus::new()));
        controller.set_input("   ");

        let action = controller.handle_key(KeyPress::new(Key::Enter)).await.unwrap();

        assert_eq!(action, ComposerAction::Ignored);
        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(controller.messages().len(), 1);
    }
}
