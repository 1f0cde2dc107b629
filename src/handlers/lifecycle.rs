use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::errors::{self, SdkError};
use crate::signin::{device_select, session};
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use std::sync::Arc;

/// Statuses arrive either as a bare string or wrapped in a small object,
/// depending on which engine side produced the message.
fn status_of(content: &Value) -> Option<String> {
    content
        .as_str()
        .map(str::to_string)
        .or_else(|| content["status"].as_str().map(str::to_string))
        .or_else(|| content["connectionStatus"].as_str().map(str::to_string))
}

pub(crate) async fn user_authorized(client: &Arc<Client>, authorized: bool) {
    if authorized {
        info!(target: "Client/Lifecycle", "user authorized");
        client.engine.lock().await.user_auth_status = "UserAuthorized".to_string();
    } else {
        client.publish_error(SdkError::from_code("NotUserAuthorized"));
    }
}

pub struct UserAuthorizedHandler;

#[async_trait]
impl MessageHandler for UserAuthorizedHandler {
    fn name(&self) -> &'static str {
        "userauthorized"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let authorized = message.content["authorized"].as_bool().unwrap_or(true);
        user_authorized(&client, authorized).await;
        true
    }
}

pub struct ConnectionStatusHandler;

#[async_trait]
impl MessageHandler for ConnectionStatusHandler {
    fn name(&self) -> &'static str {
        "connectionstatuschange"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let Some(status) = status_of(&message.content) else {
            debug!(target: "Client/Lifecycle", "connection status change without a status");
            return true;
        };
        session::provider_update(&client, &status).await;
        true
    }
}

/// Engine-side connection failures. The engine emits `None` when a prior
/// failure clears; only real failures become error events.
pub struct ConnectionFailureHandler;

#[async_trait]
impl MessageHandler for ConnectionFailureHandler {
    fn name(&self) -> &'static str {
        "connectionfailure"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let reason = message.content.as_str().unwrap_or("").to_string();
        if reason.is_empty() || reason == "None" {
            return true;
        }
        let entry = errors::resolve(Some(&reason), Some("ServerConnectionFailure"));
        client.publish_error(SdkError::new(entry).with_native_error(reason));
        true
    }
}

pub struct AuthenticationResultHandler;

#[async_trait]
impl MessageHandler for AuthenticationResultHandler {
    fn name(&self) -> &'static str {
        "authenticationresult"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let status = message.content["status"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.content.to_string());
        debug!(target: "Client/Lifecycle", "authentication result {status}");
        client.session.lock().await.last_auth_status = status;
        true
    }
}

pub struct LifecycleStateHandler;

#[async_trait]
impl MessageHandler for LifecycleStateHandler {
    fn name(&self) -> &'static str {
        "lifecyclestatechanged"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let state = message.content["state"]
            .as_str()
            .or_else(|| message.content.as_str())
            .unwrap_or("")
            .to_string();
        session::lifecycle_update(&client, &state).await;
        true
    }
}

/// Authentication landed. Device selection needs both this and a device
/// list; whichever arrives second kicks it off.
pub struct LoggedInHandler;

#[async_trait]
impl MessageHandler for LoggedInHandler {
    fn name(&self) -> &'static str {
        "loggedin"
    }

    async fn handle(&self, client: Arc<Client>, _message: &ServerMessage) -> bool {
        info!(target: "Client/Lifecycle", "logged in");
        client.sso.lock().await.in_progress = false;
        client.event_bus.signed_in.send(Arc::new(())).ok();

        let devices_ready = {
            let mut session = client.session.lock().await;
            session.connect_on_auth = true;
            session.telephony_devices_set
        };
        if devices_ready {
            device_select::proceed_with_device_selection(&client).await;
        }
        true
    }
}
