use crate::client::Client;
use crate::errors::SdkError;
use crate::types::device::{PhoneDevice, PhoneMode};
use crate::types::events::SystemUpdate;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Placeholder identity used to satisfy the discovery engine during manual
/// sign-in, where the email is never shown or stored.
pub(crate) const MANUAL_SIGNIN_EMAIL: &str = "jabbersdk@any.domain";

/// A CUCM password in either form. Plaintext passphrases are encrypted
/// through the engine before they ever appear in a sign-in request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passphrase {
    Plain(String),
    Encrypted(String),
}

impl Passphrase {
    pub fn is_empty(&self) -> bool {
        match self {
            Passphrase::Plain(s) | Passphrase::Encrypted(s) => s.is_empty(),
        }
    }

    pub(crate) fn secret(&self) -> &str {
        match self {
            Passphrase::Plain(s) | Passphrase::Encrypted(s) => s,
        }
    }
}

/// Snapshot of a completed or in-flight registration, the payload of the
/// system event and of sign-in completion.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub mode: Option<PhoneMode>,
    pub user: Option<String>,
    pub email: Option<String>,
    /// Devices the engine reported, keyed by trimmed device name.
    pub devices: HashMap<String, PhoneDevice>,
    pub device: Option<PhoneDevice>,
    pub line: Option<Value>,
    pub cucm: Vec<String>,
    pub force_registration: bool,
    /// Encrypted passphrase echo, handed back so applications can persist it
    /// for later sign-ins without keeping plaintext around.
    pub password: Option<Passphrase>,
}

/// Which prompt the previous attempt died on. Decides whether the next
/// manual attempt re-drives credentials instead of restarting the engine
/// lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    None,
    EmailRequired,
    CredentialsRequired,
}

pub(crate) type Completion = oneshot::Sender<Result<Registration, SdkError>>;

/// All mutable sign-in state. One attempt at a time; [`reset`] starts the
/// next attempt fresh while carrying over the fields that must survive
/// (identity, pending sign-out, last error context).
///
/// [`reset`]: RegistrationSession::reset
#[derive(Default)]
pub(crate) struct RegistrationSession {
    pub registering: bool,
    pub manual: bool,
    pub signing_out: bool,
    pub switching_mode: bool,
    pub telephony_devices_set: bool,
    /// Device connection should run once authentication lands.
    pub connect_on_auth: bool,
    /// Connect-once guard; cleared by reset so a failed attempt can retry
    /// the same device.
    pub last_connected_device: String,
    pub last_auth_status: String,
    pub error_state: ErrorState,
    pub last_authenticator_id: Option<i64>,
    pub email_prompted: bool,
    pub credentials_prompted: bool,
    pub user: String,
    pub email: String,
    pub passphrase: Option<Passphrase>,
    pub cucm: Vec<String>,
    /// Connection status observed when the attempt began.
    pub current_state: String,
    pub unregister_pending: bool,
    pub registration: Registration,
    pub completion: Option<Completion>,
}

impl RegistrationSession {
    /// Clears the attempt, keeping identity, the pending sign-out marker and
    /// the last error context for the next attempt.
    pub fn reset(&mut self) {
        debug!(target: "Client/SignIn", "resetting session state");
        let user = std::mem::take(&mut self.user);
        let email = std::mem::take(&mut self.email);
        let manual = self.manual;
        let unregister_pending = self.unregister_pending;
        let error_state = self.error_state;
        let last_authenticator_id = self.last_authenticator_id;
        let last_auth_status = std::mem::take(&mut self.last_auth_status);

        *self = RegistrationSession {
            manual,
            user,
            email,
            unregister_pending,
            error_state,
            last_authenticator_id,
            last_auth_status,
            ..Default::default()
        };
    }
}

/// Funnel for every failed sign-in attempt: one `AuthenticationFailure` on
/// the error event (carrying the underlying cause), completion failed, and
/// the session reset with carryover.
pub(crate) async fn stop_sign_in(client: &Arc<Client>, cause: SdkError) {
    warn!(target: "Client/SignIn", "sign-in stopped: {cause}");
    let completion = {
        let mut session = client.session.lock().await;
        let completion = session.completion.take();
        session.reset();
        completion
    };
    let err = SdkError::from_code("AuthenticationFailure").with_detail(cause.to_string());
    if let Some(tx) = completion {
        let _ = tx.send(Err(err.clone()));
    }
    client.publish_error(err);
}

pub(crate) async fn stop_sign_in_from_email(client: &Arc<Client>, cause: SdkError) {
    {
        let mut session = client.session.lock().await;
        session.error_state = ErrorState::EmailRequired;
    }
    client.store.remove(crate::store::CACHED_EMAIL_KEY).await;
    stop_sign_in(client, cause).await;
}

pub(crate) async fn stop_sign_in_from_credentials(
    client: &Arc<Client>,
    cause: SdkError,
    authenticator_id: Option<i64>,
) {
    {
        let mut session = client.session.lock().await;
        session.error_state = ErrorState::CredentialsRequired;
        session.last_authenticator_id = authenticator_id;
    }
    stop_sign_in(client, cause).await;
}

/// Refreshes the registration view from the engine: the selected device and
/// line (skipped while idle, there are none) plus the full device list.
/// Returns the raw device list for selection flows.
pub(crate) async fn refresh_registration(client: &Arc<Client>, state: &str) -> Vec<PhoneDevice> {
    let mut device = None;
    let mut line = None;
    if state != "eIdle" {
        let (device_res, line_res) = tokio::join!(
            client.send_request("getProperty", Some(json!("device"))),
            client.send_request("getProperty", Some(json!("line"))),
        );
        if let Ok(content) = device_res {
            device = serde_json::from_value::<PhoneDevice>(content["device"].clone()).ok();
        }
        if let Ok(content) = line_res {
            if !content["line"].is_null() {
                line = Some(content["line"].clone());
            }
        }
    }

    let mut devices: Vec<PhoneDevice> = Vec::new();
    if let Ok(content) = client.send_request("getAvailableDevices", None).await {
        devices = serde_json::from_value(content["devices"].clone()).unwrap_or_default();
    }

    let mut session = client.session.lock().await;
    if let Some(d) = device {
        session.registration.device = Some(d);
    }
    if let Some(l) = line {
        session.registration.line = Some(l);
    }
    for d in &devices {
        let name = d.name.trim().to_string();
        if !name.is_empty() {
            session.registration.devices.insert(name, d.clone());
        }
    }
    devices
}

/// Reacts to a connection-status change (`eIdle`, `eRegistering`, `eReady`).
/// This is where a sign-in attempt completes and where sign-out resolves.
pub(crate) async fn provider_update(client: &Arc<Client>, state: &str) {
    info!(target: "Client/SignIn", "provider state {state}");
    refresh_registration(client, state).await;

    {
        let mut engine = client.engine.lock().await;
        engine.connection_status = state.to_string();
    }

    let ready = state == "eReady";
    if ready {
        let (finishing, completion) = {
            let mut session = client.session.lock().await;
            let finishing = session.registering || session.switching_mode;
            session.registering = false;
            session.switching_mode = false;
            if finishing {
                // A completed attempt invalidates the carried error context.
                session.error_state = ErrorState::None;
                session.last_authenticator_id = None;
            }
            (finishing, session.completion.take())
        };

        if finishing {
            // Merge the engine-reported mode into the completion payload.
            let mode = match client.send_request("getProperty", Some(json!("mode"))).await {
                Ok(content) => match content["mode"].as_str() {
                    Some("SoftPhone") => Some(PhoneMode::SoftPhone),
                    Some("DeskPhone") => Some(PhoneMode::DeskPhone),
                    _ => None,
                },
                Err(_) => None,
            };
            let registration = {
                let session = client.session.lock().await;
                let mut registration = session.registration.clone();
                registration.cucm = session.cucm.clone();
                registration.password = session.passphrase.clone();
                registration.mode = mode;
                registration
            };
            if let Some(tx) = completion {
                let _ = tx.send(Ok(registration));
            } else {
                warn!(target: "Client/SignIn", "phone became ready with no sign-in waiting");
            }
        }
    }

    let registration = client.session.lock().await.registration.clone();
    client.event_bus.system.send(Arc::new(SystemUpdate {
        status: state.to_string(),
        ready,
        registration,
    }))
    .ok();

    if ready {
        // Seed the reconciliation engine with any calls that already exist.
        if let Ok(content) = client.send_request("getCalls", None).await {
            if let Some(calls) = content["calls"].as_array() {
                for call in calls.clone() {
                    crate::calls::reconcile::process_snapshot_value(client, call).await;
                }
            }
        }
    } else if state == "eIdle" {
        let pending = {
            let mut session = client.session.lock().await;
            std::mem::take(&mut session.unregister_pending)
        };
        if pending {
            let callbacks = client.callbacks.clone();
            crate::signin::run_callback("signed_out", async move {
                callbacks.signed_out().await;
            })
            .await;
        }
    }
}

/// Engine lifecycle state changes. `SIGNEDOUT` arrives well before the idle
/// connection status does, so a pending sign-out synthesizes the idle
/// update; the registered phone is unavailable in between anyway.
pub(crate) async fn lifecycle_update(client: &Arc<Client>, state: &str) {
    debug!(target: "Client/SignIn", "lifecycle state {state}");
    match state {
        "SIGNEDOUT" => {
            let was_signing_out = {
                let mut session = client.session.lock().await;
                std::mem::take(&mut session.signing_out)
            };
            if was_signing_out {
                provider_update(client, "eIdle").await;
            }
        }
        "SIGNINGOUT" => {
            client.session.lock().await.signing_out = true;
        }
        "RESETTING" => {
            // A reset mid-discovery re-fires the email prompt; without
            // clearing this guard that prompt would be treated as a repeat
            // and fail the attempt.
            client.session.lock().await.email_prompted = false;
        }
        _ => {}
    }
}

impl Client {
    /// Signs the user out and releases the registered device. Completion is
    /// reported through [`crate::signin::SessionCallbacks::signed_out`] once
    /// the phone reaches the idle state.
    pub async fn sign_out(self: &Arc<Self>) {
        info!(target: "Client/SignIn", "signing out");
        self.send_command("logout", None).await;
        let mut session = self.session.lock().await;
        session.unregister_pending = true;
        session.registration = Registration::default();
        session.reset();
    }

    /// Clears cached user and system data. Only meaningful while signed
    /// out; required before a manual sign-in that follows a discovery one.
    pub async fn reset_data(self: &Arc<Self>) {
        self.send_command("resetData", Some(json!({}))).await;
        self.store.remove(crate::store::CACHED_EMAIL_KEY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_carries_identity_and_error_context() {
        let mut session = RegistrationSession {
            registering: true,
            manual: true,
            user: "jdoe".into(),
            email: "jdoe@example.com".into(),
            error_state: ErrorState::CredentialsRequired,
            last_authenticator_id: Some(3),
            last_auth_status: "failed".into(),
            unregister_pending: true,
            telephony_devices_set: true,
            last_connected_device: "ECPjdoe".into(),
            email_prompted: true,
            ..Default::default()
        };
        session.reset();

        assert!(!session.registering);
        assert!(session.manual);
        assert_eq!(session.user, "jdoe");
        assert_eq!(session.email, "jdoe@example.com");
        assert_eq!(session.error_state, ErrorState::CredentialsRequired);
        assert_eq!(session.last_authenticator_id, Some(3));
        assert_eq!(session.last_auth_status, "failed");
        assert!(session.unregister_pending);
        // Attempt-scoped guards are cleared.
        assert!(!session.telephony_devices_set);
        assert!(session.last_connected_device.is_empty());
        assert!(!session.email_prompted);
    }
}
