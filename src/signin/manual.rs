use super::session::{self, MANUAL_SIGNIN_EMAIL, Passphrase, Registration};
use crate::client::Client;
use crate::errors::SdkError;
use crate::signin::discovery;
use crate::types::device::PhoneMode;
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;

/// The engine rejects address lists longer than this.
const MAX_SERVERS: usize = 3;

/// Resolved CUCM address lists, one per protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CucmServers {
    pub tftp: Vec<String>,
    pub ccmcip: Vec<String>,
    pub cti: Vec<String>,
}

/// CUCM input as applications provide it: either a single address (possibly
/// with a descriptive prefix, only the last whitespace-separated token
/// counts) or explicit per-endpoint lists.
#[derive(Debug, Clone)]
pub enum CucmInput {
    Address(String),
    Servers {
        tftp: Vec<String>,
        ccmcip: Option<Vec<String>>,
        cti: Option<Vec<String>>,
    },
}

fn capped(name: &str, mut list: Vec<String>) -> Vec<String> {
    if list.len() > MAX_SERVERS {
        warn!(
            target: "Client/SignIn",
            "{name} server list has {} entries, keeping the first {MAX_SERVERS}",
            list.len()
        );
        list.truncate(MAX_SERVERS);
    }
    list
}

impl CucmInput {
    /// Normalizes to full per-endpoint lists. CCMCIP and CTI fall back to
    /// the TFTP list; every list is truncated to the engine's limit.
    pub(crate) fn resolve(&self) -> Result<CucmServers, SdkError> {
        let servers = match self {
            CucmInput::Address(raw) => {
                let address = raw.split_whitespace().last().unwrap_or("").to_string();
                if address.is_empty() {
                    return Err(invalid_args("cucm address must not be empty"));
                }
                CucmServers {
                    tftp: vec![address.clone()],
                    ccmcip: vec![address.clone()],
                    cti: vec![address],
                }
            }
            CucmInput::Servers { tftp, ccmcip, cti } => {
                if tftp.is_empty() {
                    return Err(invalid_args("at least one TFTP server is required"));
                }
                let tftp = capped("tftp", tftp.clone());
                let ccmcip = capped("ccmcip", ccmcip.clone().unwrap_or_else(|| tftp.clone()));
                let cti = capped("cti", cti.clone().unwrap_or_else(|| tftp.clone()));
                CucmServers { tftp, ccmcip, cti }
            }
        };
        Ok(servers)
    }
}

/// Arguments to [`Client::register_phone`].
#[derive(Debug, Clone)]
pub struct ManualSignIn {
    pub user: String,
    pub passphrase: Passphrase,
    pub cucm: CucmInput,
    /// Preferred phone mode; the default device picker uses it. Softphone
    /// when unset.
    pub mode: Option<PhoneMode>,
    pub force_registration: bool,
}

fn invalid_args(detail: &str) -> SdkError {
    SdkError::from_code("InvalidArguments").with_detail(detail)
}

/// Encrypts a plaintext passphrase through the engine. Already-encrypted
/// passphrases pass through untouched.
pub(crate) async fn encrypt_passphrase(
    client: &Arc<Client>,
    passphrase: Passphrase,
) -> Result<Passphrase, SdkError> {
    let plain = match passphrase {
        Passphrase::Plain(p) => p,
        encrypted @ Passphrase::Encrypted(_) => return Ok(encrypted),
    };
    let content = client
        .send_request("encryptCucmPassword", Some(json!({ "password": plain })))
        .await?;
    content
        .as_str()
        .or_else(|| content["password"].as_str())
        .map(|s| Passphrase::Encrypted(s.to_string()))
        .ok_or_else(|| {
            SdkError::from_code("eOperationFailed").with_native_request("encryptCucmPassword")
        })
}

impl Client {
    /// Signs in with manual CUCM settings and registers a phone device.
    /// Resolves once the phone reaches the ready state; any failure along
    /// the way resolves the same future with the funneled error.
    pub async fn register_phone(
        self: &Arc<Self>,
        args: ManualSignIn,
    ) -> Result<Registration, SdkError> {
        let servers = args.cucm.resolve()?;
        if args.user.trim().is_empty() {
            return Err(invalid_args("user must not be empty"));
        }
        if args.passphrase.is_empty() {
            return Err(invalid_args("passphrase must not be empty"));
        }

        let passphrase = encrypt_passphrase(self, args.passphrase).await?;

        let (rx, redrive_authenticator) = {
            let mut session = self.session.lock().await;
            if session.registering {
                return Err(SdkError::from_code("InvalidState")
                    .with_detail("a sign-in attempt is already running"));
            }
            session.registering = true;
            session.manual = true;
            session.user = args.user.clone();
            session.email = MANUAL_SIGNIN_EMAIL.to_string();
            session.passphrase = Some(passphrase.clone());
            session.cucm = servers.tftp.clone();
            session.registration.user = Some(args.user.clone());
            session.registration.email = Some(MANUAL_SIGNIN_EMAIL.to_string());
            session.registration.mode = args.mode;
            session.registration.force_registration = args.force_registration;

            let redrive = (session.error_state
                == super::session::ErrorState::CredentialsRequired)
                .then_some(session.last_authenticator_id);

            let (tx, rx) = tokio::sync::oneshot::channel();
            session.completion = Some(tx);
            (rx, redrive)
        };

        info!(target: "Client/SignIn", "manual sign-in for {}", args.user);

        let (tftp, ccmcip, cti, status) = tokio::join!(
            self.send_request(
                "setProperty",
                Some(json!({"name": "TftpAddressList", "value": servers.tftp})),
            ),
            self.send_request(
                "setProperty",
                Some(json!({"name": "CcmcipAddressList", "value": servers.ccmcip})),
            ),
            self.send_request(
                "setProperty",
                Some(json!({"name": "CtiAddressList", "value": servers.cti})),
            ),
            self.send_request("getProperty", Some(json!("connectionStatus"))),
        );
        if let Err(err) = tftp.and(ccmcip).and(cti) {
            session::stop_sign_in(self, err).await;
            return finish(rx).await;
        }
        let status = match status {
            Ok(content) => content["connectionStatus"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            Err(err) => {
                session::stop_sign_in(self, err).await;
                return finish(rx).await;
            }
        };
        self.session.lock().await.current_state = status.clone();

        if status == "eReady" {
            // The phone is already registered with these settings.
            session::provider_update(self, "eReady").await;
        } else if let Some(authenticator) = redrive_authenticator {
            // The previous attempt died at the credentials prompt; the
            // engine is still sitting there, so re-drive the prompt rather
            // than restarting the whole lifecycle.
            discovery::set_credentials(self, &args.user, passphrase, authenticator).await;
        } else {
            self.send_command("startSignIn", Some(json!({"manualSettings": true})))
                .await;
        }

        finish(rx).await
    }
}

async fn finish(
    rx: tokio::sync::oneshot::Receiver<Result<Registration, SdkError>>,
) -> Result<Registration, SdkError> {
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(SdkError::from_code("ServerConnectionFailure")
            .with_detail("channel lost during sign-in")),
    }
}
