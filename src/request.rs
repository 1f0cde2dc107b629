use crate::channel::{ChannelError, ClientEnvelope, ClientMessage, ServerMessage};
use crate::client::Client;
use crate::errors::{self, SdkError};
use log::{debug, warn};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;

/// Reserved correlation id for the one-time `init` handshake.
pub const INIT_MESSAGE_ID: &str = "0";

impl Client {
    /// Generates a correlation id unique for this channel across client
    /// restarts, in case an old server reply is still in the pipeline.
    pub(crate) fn generate_message_id(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix: u32 = rand::rng().random_range(1..=10000);
        format!("{millis}{suffix}")
    }

    /// Sends a request and waits for the matching reply.
    ///
    /// There is no timeout arm: the protocol has no deadline semantics, so an
    /// unanswered request stays pending until the reply arrives or the
    /// channel is lost, at which point it fails with `CannotConnectToServer`.
    pub async fn send_request(&self, name: &str, content: Option<Value>) -> Result<Value, SdkError> {
        let id = self.generate_message_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.response_waiters.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.post_message(&id, name, content).await {
            self.response_waiters.lock().await.remove(&id);
            return Err(channel_error(name, e));
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(SdkError::from_code("ServerConnectionFailure")
                .with_native_request(name)
                .with_detail("channel lost while waiting for reply")),
        }
    }

    /// Sends a request without waiting. A failed reply still surfaces on the
    /// error event with the request name attached; a purged waiter stays
    /// silent.
    pub(crate) async fn send_command(self: &Arc<Self>, name: &str, content: Option<Value>) {
        let id = self.generate_message_id();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.response_waiters.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.post_message(&id, name, content).await {
            self.response_waiters.lock().await.remove(&id);
            debug!(target: "Client/Request", "dropping command {name}: {e}");
            return;
        }

        let client = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            match rx.await {
                Ok(Ok(_)) | Err(_) => {}
                Ok(Err(err)) => {
                    warn!(target: "Client/Request", "{name} failed: {err}");
                    client.publish_error(err.with_native_request(name));
                }
            }
        });
    }

    /// Posts one envelope through the attached channel. The encrypt-password
    /// request masks its content in the log line.
    pub(crate) async fn post_message(
        &self,
        id: &str,
        name: &str,
        content: Option<Value>,
    ) -> Result<(), ChannelError> {
        let sink = { self.sink.lock().await.clone() };
        let sink = match sink {
            Some(s) => s,
            None => return Err(ChannelError::NotAttached),
        };

        if name == "encryptCucmPassword" {
            debug!(target: "Client/Request", "send {name} id={id} content=*****");
        } else {
            debug!(target: "Client/Request", "send {name} id={id}");
        }

        let envelope = ClientEnvelope {
            message: ClientMessage {
                message_id: id.to_string(),
                name: name.to_string(),
                content,
            },
        };
        sink.post(serde_json::to_value(&envelope).unwrap_or(Value::Null))
            .await
    }

    /// Resolves a reply against the pending table. Returns true when a
    /// waiter consumed it. At most one waiter exists per id, so a duplicate
    /// reply is a no-op.
    pub(crate) async fn handle_reply(&self, id: &str, message: &ServerMessage) -> bool {
        let waiter = self.response_waiters.lock().await.remove(id);
        let Some(waiter) = waiter else {
            return false;
        };

        let result = match message_error(message) {
            Some(err) => Err(err),
            None => Ok(message.content.clone()),
        };
        if waiter.send(result).is_err() {
            debug!(target: "Client/Request", "reply waiter for id {id} was dropped");
        }
        true
    }

    /// Drops every pending request without invoking its callbacks. Direct
    /// awaiters observe the loss as `CannotConnectToServer`.
    pub(crate) async fn purge_pending(&self) {
        let purged = {
            let mut waiters = self.response_waiters.lock().await;
            std::mem::take(&mut *waiters)
        };
        if !purged.is_empty() {
            debug!(target: "Client/Request", "purged {} pending request(s)", purged.len());
        }
    }
}

/// Reads the engine error off an inbound message, normalizing the empty
/// string and the no-error sentinel away. When the top-level error field is
/// clean, a non-empty `content.errors` list resolves through the taxonomy
/// via its first entry, with the raw list kept as detail.
pub(crate) fn message_error(message: &ServerMessage) -> Option<SdkError> {
    if let Some(code) = message.error.as_deref()
        && !code.is_empty()
        && code != "eNoError"
    {
        return Some(SdkError::from_code(code));
    }
    let list = content_errors(&message.content);
    list.first().map(|code| {
        let entry = errors::resolve(Some(code), None);
        SdkError::new(entry)
            .with_native_error(code.clone())
            .with_detail(list.join(", "))
    })
}

pub(crate) fn content_errors(content: &Value) -> Vec<String> {
    content["errors"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn channel_error(name: &str, e: ChannelError) -> SdkError {
    SdkError::from_code("ServerConnectionFailure")
        .with_native_request(name)
        .with_detail(e.to_string())
}
