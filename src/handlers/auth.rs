use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::errors::SdkError;
use crate::signin::{discovery, session};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

pub struct EmailRequiredHandler;

#[async_trait]
impl MessageHandler for EmailRequiredHandler {
    fn name(&self) -> &'static str {
        "userprofileemailaddressrequired"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        discovery::handle_email_required(&client, &message.content).await;
        true
    }
}

pub struct CredentialsRequiredHandler;

#[async_trait]
impl MessageHandler for CredentialsRequiredHandler {
    fn name(&self) -> &'static str {
        "userprofilecredentialsrequired"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        discovery::handle_credentials_required(&client, &message.content).await;
        true
    }
}

/// The engine decided the home cluster requires single sign-on while a
/// manual attempt was running. Manual settings cannot satisfy that, so the
/// attempt fails.
pub struct SsoSignInRequiredHandler;

#[async_trait]
impl MessageHandler for SsoSignInRequiredHandler {
    fn name(&self) -> &'static str {
        "ssosigninrequired"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        client.sso.lock().await.in_progress = false;
        let registering = client.session.lock().await.registering;
        if registering {
            warn!(target: "Client/SignIn", "single sign-on required, stopping current attempt");
            let cause = discovery::prompt_error(&message.content)
                .unwrap_or_else(|| SdkError::from_code("SSOStartSessionError"));
            session::stop_sign_in(&client, cause).await;
        }
        true
    }
}
