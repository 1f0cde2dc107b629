pub mod device_select;
pub mod discovery;
pub mod manual;
pub mod session;

use crate::client::Client;
use crate::errors::SdkError;
use crate::types::device::PhoneMode;
use crate::types::PhoneDevice;
use async_trait::async_trait;
use log::warn;
use session::Passphrase;
use std::sync::Arc;

/// Application hooks driven by the sign-in lifecycle. Every method has a
/// declining default, so embedders implement only what their UI supports.
/// Prompt methods return `true` when the application took ownership of the
/// prompt; `false` means "not implemented", which the discovery flow reports
/// as `ServiceDiscoveryMissingOrInvalidCallback`.
#[async_trait]
pub trait SessionCallbacks: Send + Sync {
    /// Discovery needs an identity email. `hint` carries the best cached
    /// guess, possibly empty.
    async fn email_required(&self, prompt: EmailPrompt, hint: String) -> bool {
        let _ = (prompt, hint);
        false
    }

    /// The home cluster wants credentials. `hint` is the cached username.
    async fn credentials_required(&self, prompt: CredentialsPrompt, hint: String) -> bool {
        let _ = (prompt, hint);
        false
    }

    /// Devices are available for selection. Returning `false` lets the
    /// default picker choose.
    async fn devices_available(
        &self,
        devices: Vec<PhoneDevice>,
        mode: PhoneMode,
        selector: DeviceSelector,
    ) -> bool {
        let _ = (devices, mode, selector);
        false
    }

    /// Single sign-on needs the application to navigate a window to `url`.
    /// The token comes back through [`Client::sso_navigation_completed`].
    async fn sso_navigation_required(&self, url: String) -> bool {
        let _ = url;
        false
    }

    /// The engine presented a certificate it could not validate.
    async fn certificate_required(&self, info: serde_json::Value, responder: CertificateResponder) -> bool {
        let _ = (info, responder);
        false
    }

    /// Sign-out completed (the phone reached the idle connection state).
    async fn signed_out(&self) {}
}

/// A no-op implementation for embedders that only consume the event bus.
pub struct NoCallbacks;

#[async_trait]
impl SessionCallbacks for NoCallbacks {}

/// Runs one application callback on its own task so a panic inside it
/// cannot unwind into the dispatch loop. A panicked prompt counts as
/// declined.
pub(crate) async fn run_callback<T, F>(name: &'static str, fut: F) -> Option<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = T> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(target: "Client/Callbacks", "{name} callback panicked: {e}");
            None
        }
    }
}

/// Handle passed to [`SessionCallbacks::email_required`].
pub struct EmailPrompt {
    pub(crate) client: Arc<Client>,
}

impl EmailPrompt {
    pub async fn submit(&self, email: &str) {
        discovery::set_email_address(&self.client, email).await;
    }
}

/// Handle passed to [`SessionCallbacks::credentials_required`].
pub struct CredentialsPrompt {
    pub(crate) client: Arc<Client>,
    pub(crate) authenticator_id: Option<i64>,
}

impl CredentialsPrompt {
    pub async fn submit(&self, username: &str, passphrase: Passphrase) {
        discovery::set_credentials(&self.client, username, passphrase, self.authenticator_id).await;
    }
}

/// Handle passed to [`SessionCallbacks::devices_available`].
pub struct DeviceSelector {
    pub(crate) client: Arc<Client>,
}

impl DeviceSelector {
    /// Completes device registration with the application's choice. The line
    /// is only meaningful in deskphone mode and is ignored otherwise.
    pub async fn select(&self, mode: PhoneMode, device_name: &str, line_dn: &str) {
        let line = if mode == PhoneMode::SoftPhone { "" } else { line_dn };
        device_select::send_connect(&self.client, device_name, line).await;
    }
}

/// Handle passed to [`SessionCallbacks::certificate_required`].
pub struct CertificateResponder {
    pub(crate) client: Arc<Client>,
}

impl CertificateResponder {
    pub async fn respond(&self, fingerprint: &str, accept: bool) -> Result<(), SdkError> {
        if fingerprint.is_empty() {
            return Err(SdkError::from_code("eInvalidArgument")
                .with_detail("certificate fingerprint must not be empty"));
        }
        self.client
            .send_command(
                "handleInvalidCertificate",
                Some(serde_json::json!({
                    "certFingerprint": fingerprint,
                    "accept": accept,
                })),
            )
            .await;
        Ok(())
    }
}
