use crate::channel::ServerMessage;
use crate::client::Client;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for handling named server messages.
///
/// Implementors register with the [`super::router::MessageRouter`] keyed by
/// the message name they consume. One message may both resolve a pending
/// request and be dispatched here; reply resolution always runs first.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// The message name this handler consumes (e.g. "callstatechange").
    fn name(&self) -> &'static str;

    /// Handle the message. Returns `true` if the message was processed,
    /// `false` if it should be treated as unhandled.
    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool;
}
