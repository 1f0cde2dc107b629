use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::signin::discovery;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

pub struct SsoNavigateHandler;

#[async_trait]
impl MessageHandler for SsoNavigateHandler {
    fn name(&self) -> &'static str {
        "ssonavigateto"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let url = message.content["url"].as_str().unwrap_or("").to_string();
        discovery::handle_sso_navigate(&client, url).await;
        true
    }
}

pub struct CanCancelSsoHandler;

#[async_trait]
impl MessageHandler for CanCancelSsoHandler {
    fn name(&self) -> &'static str {
        "cancancelsinglesignonchanged"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let can_cancel = message.content["canCancel"].as_bool().unwrap_or(false);
        debug!(target: "Client/SignIn", "sso can-cancel {can_cancel}");
        client.sso.lock().await.can_cancel = can_cancel;
        true
    }
}
