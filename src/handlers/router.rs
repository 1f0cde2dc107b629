use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use std::collections::HashMap;
use std::sync::Arc;

/// Central router for dispatching named server messages to their handlers.
///
/// The handler table is fixed at client construction; names that have no
/// handler are logged and dropped by the caller.
pub struct MessageRouter {
    /// Map of message name -> handler for fast lookups
    handlers: HashMap<&'static str, Arc<dyn MessageHandler>>,
}

impl MessageRouter {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a specific message name.
    ///
    /// # Panics
    /// Panics if a handler is already registered for the same name to
    /// prevent accidental overwrites during initialization.
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_some() {
            panic!("Handler for message '{}' already registered", name);
        }
    }

    /// Dispatch a message to its handler.
    ///
    /// Returns `true` if a handler was found and processed the message,
    /// `false` if no handler was registered for the name or the handler
    /// indicated it couldn't process the message.
    pub async fn dispatch(&self, client: Arc<Client>, name: &str, message: &ServerMessage) -> bool {
        if let Some(handler) = self.handlers.get(name) {
            handler.handle(client, message).await
        } else {
            false
        }
    }

    /// Get the number of registered handlers (useful for testing).
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ServerMessage;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockHandler {
        name: &'static str,
        handled: AtomicBool,
    }

    impl MockHandler {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                handled: AtomicBool::new(false),
            }
        }

        fn was_handled(&self) -> bool {
            self.handled.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl MessageHandler for MockHandler {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _client: Arc<Client>, _message: &ServerMessage) -> bool {
            self.handled.store(true, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_router_registration() {
        let mut router = MessageRouter::new();
        router.register(Arc::new(MockHandler::new("test")));
        assert_eq!(router.handler_count(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let mut router = MessageRouter::new();
        router.register(Arc::new(MockHandler::new("test")));
        router.register(Arc::new(MockHandler::new("test")));
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_name() {
        let mut router = MessageRouter::new();
        let handler = Arc::new(MockHandler::new("callstatechange"));
        router.register(handler.clone());

        let client = crate::client::test_client().await;
        let message = ServerMessage::default();

        assert!(
            router
                .dispatch(client.clone(), "callstatechange", &message)
                .await
        );
        assert!(handler.was_handled());
        assert!(!router.dispatch(client, "unknown", &message).await);
    }
}
