use crate::calls::{CallTable, TransferState};
use crate::calls::video::ActiveVideo;
use crate::channel::{ChannelControlMessage, ChannelSink, ServerEnvelope};
use crate::config::ClientConfig;
use crate::errors::SdkError;
use crate::handlers;
use crate::handlers::router::MessageRouter;
use crate::signin::SessionCallbacks;
use crate::signin::session::RegistrationSession;
use crate::store::CacheStore;
use crate::types::events::EventBus;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

/// What the engine told us about itself in the `init` handshake.
#[derive(Debug, Default)]
pub struct EngineInfo {
    pub instance_id: Option<String>,
    pub version: Value,
    pub user_auth_status: String,
    pub capabilities: Value,
    pub connection_status: String,
}

/// Single sign-on progress flags, driven by engine events.
#[derive(Debug, Default)]
pub(crate) struct SsoState {
    pub in_progress: bool,
    pub can_cancel: bool,
}

/// Deferred device connect, replayed once multimedia capabilities start.
#[derive(Debug, Clone)]
pub(crate) struct PendingConnect {
    pub device_name: String,
    pub line_dn: String,
}

#[derive(Default)]
pub(crate) struct MediaState {
    pub multimedia_started: bool,
    pub pending_connect: Option<PendingConnect>,
    /// Trailing-edge debounce task for the telephony device stream.
    pub devices_debounce: Option<JoinHandle<()>>,
}

/// The session coordinator. Owns the channel boundary, the pending-request
/// table, the sign-in state machine and the call reconciliation state; all
/// consumers hold it behind an `Arc`.
pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) sink: Mutex<Option<Arc<dyn ChannelSink>>>,
    pub(crate) response_waiters:
        Mutex<HashMap<String, oneshot::Sender<Result<Value, SdkError>>>>,
    pub(crate) router: MessageRouter,
    pub event_bus: EventBus,
    pub(crate) callbacks: Arc<dyn SessionCallbacks>,
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) session: Mutex<RegistrationSession>,
    pub(crate) sso: Mutex<SsoState>,
    pub(crate) calls: Mutex<CallTable>,
    pub(crate) transfer: Mutex<TransferState>,
    pub(crate) video: Mutex<ActiveVideo>,
    pub(crate) media: Mutex<MediaState>,
    pub(crate) engine: Mutex<EngineInfo>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        callbacks: Arc<dyn SessionCallbacks>,
        store: Arc<dyn CacheStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            sink: Mutex::new(None),
            response_waiters: Mutex::new(HashMap::new()),
            router: handlers::build_router(),
            event_bus: EventBus::new(),
            callbacks,
            store,
            session: Mutex::new(RegistrationSession::default()),
            sso: Mutex::new(SsoState::default()),
            calls: Mutex::new(CallTable::default()),
            transfer: Mutex::new(TransferState::default()),
            video: Mutex::new(ActiveVideo::default()),
            media: Mutex::new(MediaState::default()),
            engine: Mutex::new(EngineInfo::default()),
        })
    }

    /// Attaches a channel and runs the `init` handshake on the reserved
    /// correlation id. Must complete before any other request is sent.
    pub async fn attach_channel(
        self: &Arc<Self>,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<(), SdkError> {
        *self.sink.lock().await = Some(sink);

        let (tx, rx) = oneshot::channel();
        self.response_waiters
            .lock()
            .await
            .insert(crate::request::INIT_MESSAGE_ID.to_string(), tx);

        if let Err(e) = self
            .post_message(crate::request::INIT_MESSAGE_ID, "init", None)
            .await
        {
            self.response_waiters
                .lock()
                .await
                .remove(crate::request::INIT_MESSAGE_ID);
            return Err(SdkError::from_code("ServerConnectionFailure")
                .with_native_request("init")
                .with_detail(e.to_string()));
        }

        let content = match rx.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SdkError::from_code("ServerConnectionFailure")
                    .with_native_request("init")
                    .with_detail("channel lost during init"));
            }
        };

        let auth_status = content["userauthstatus"].as_str().unwrap_or("").to_string();
        {
            let mut engine = self.engine.lock().await;
            engine.instance_id = content["instanceId"]
                .as_str()
                .map(str::to_string)
                .or_else(|| content["instanceId"].as_u64().map(|n| n.to_string()));
            engine.version = content["version"].clone();
            engine.capabilities = content["capabilities"].clone();
            engine.user_auth_status = auth_status.clone();
        }
        info!(target: "Client", "initialized, user auth status {auth_status}");

        match auth_status.as_str() {
            // Domain whitelisting grants immediate authorization.
            "UserAuthorized" => handlers::lifecycle::user_authorized(self, true).await,
            "MustShowAuth" => {
                debug!(target: "Client", "waiting for user authorization");
            }
            other => {
                debug!(target: "Client", "init with auth status '{other}'");
            }
        }
        Ok(())
    }

    /// Feeds one raw inbound value from the embedder into the client:
    /// channel control first, then reply resolution, then named dispatch.
    pub async fn process_incoming(self: &Arc<Self>, raw: Value) {
        let envelope: ServerEnvelope = match serde_json::from_value(raw) {
            Ok(e) => e,
            Err(e) => {
                warn!(target: "Client", "unparseable inbound message: {e}");
                return;
            }
        };

        if let Some(control) = envelope.control {
            self.handle_channel_loss(control).await;
            return;
        }

        let Some(message) = envelope.message else {
            warn!(target: "Client", "inbound envelope carried no message");
            return;
        };

        if let Some(id) = message.reply_id() {
            let consumed = self.handle_reply(&id, &message).await;
            if !consumed {
                warn!(target: "Client", "reply for unknown correlation id {id}, dropping");
            }
        }

        if let Some(name) = message.name.clone() {
            let handled = self.router.dispatch(self.clone(), &name, &message).await;
            if !handled {
                debug!(target: "Client", "no handler for message '{name}'");
            }
        }
    }

    /// The transport or its host went away: drop the channel, purge pending
    /// requests without callbacks, and raise one unavailability error.
    async fn handle_channel_loss(&self, control: ChannelControlMessage) {
        warn!(target: "Client", "channel control message: {}", control.name);
        *self.sink.lock().await = None;
        self.purge_pending().await;

        let err = if control.is_host_disconnect() {
            SdkError::from_code("PluginNotAvailable")
        } else if control.is_channel_disconnect() {
            SdkError::from_code("ExtensionNotAvailable")
        } else {
            SdkError::from_code("Unknown").with_detail(control.name.clone())
        };
        self.publish_error(err);
    }

    pub(crate) fn publish_error(&self, err: SdkError) {
        warn!(target: "Client", "error event: {err}");
        self.event_bus.error.send(Arc::new(err)).ok();
    }
}

#[cfg(test)]
pub(crate) async fn test_client() -> Arc<Client> {
    Client::new(
        ClientConfig::default(),
        Arc::new(crate::signin::NoCallbacks),
        Arc::new(crate::store::MemoryStore::new()),
    )
}
