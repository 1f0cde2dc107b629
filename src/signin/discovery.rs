use super::session::{self, MANUAL_SIGNIN_EMAIL, Passphrase, Registration};
use super::{CredentialsPrompt, EmailPrompt, run_callback};
use crate::client::Client;
use crate::errors::{self, SdkError};
use crate::request::content_errors;
use crate::types::device::PhoneMode;
use log::{debug, info, warn};
use serde_json::{Value, json};
use std::sync::Arc;

/// OAuth2 client id registered for this SDK; the engine's own id is swapped
/// out of every authorization URL it hands us.
const SSO_CLIENT_ID: &str = "C69908c4f345729af0a23cdfff1d255272de942193e7d39171ddd307bc488d7a1";

/// Reads the funneled error off a prompt payload, if the engine attached
/// one to explain why the previous answer was rejected.
pub(crate) fn prompt_error(content: &Value) -> Option<SdkError> {
    let list = content_errors(content);
    list.first().map(|code| {
        SdkError::new(errors::resolve(Some(code), None))
            .with_native_error(code.clone())
            .with_detail(list.join(", "))
    })
}

impl Client {
    /// Signs in through service discovery. The email identity comes from
    /// `email`, the cached value of a previous attempt, or the
    /// [`crate::signin::SessionCallbacks::email_required`] prompt, in that
    /// order. Resolves like [`Client::register_phone`] does.
    pub async fn start_discovery(
        self: &Arc<Self>,
        email: Option<String>,
        mode: Option<PhoneMode>,
    ) -> Result<Registration, SdkError> {
        let rx = {
            let mut session = self.session.lock().await;
            if session.registering {
                return Err(SdkError::from_code("InvalidState")
                    .with_detail("a sign-in attempt is already running"));
            }
            session.registering = true;
            session.manual = false;
            session.email = email.clone().unwrap_or_default();
            session.registration.email = email;
            session.registration.mode = mode;
            let (tx, rx) = tokio::sync::oneshot::channel();
            session.completion = Some(tx);
            rx
        };
        self.sso.lock().await.in_progress = true;

        info!(target: "Client/SignIn", "discovery sign-in starting");
        self.send_command("startSignIn", Some(json!({"manualSettings": false})))
            .await;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(SdkError::from_code("ServerConnectionFailure")
                .with_detail("channel lost during sign-in")),
        }
    }

    /// Hands the final URL of a completed single sign-on navigation back to
    /// the engine, which extracts the authorization code from it.
    pub async fn sso_navigation_completed(self: &Arc<Self>, url: &str) {
        self.send_command(
            "ssoNavigationCompleted",
            Some(json!({"result": 200, "url": url, "document": ""})),
        )
        .await;
    }

    /// Cancels an in-flight single sign-on, when the engine allows it. The
    /// cancel window is signalled by the engine and tracked internally.
    pub async fn cancel_sso(self: &Arc<Self>) -> Result<(), SdkError> {
        {
            let sso = self.sso.lock().await;
            if !sso.in_progress || !sso.can_cancel {
                return Err(SdkError::from_code("InvalidState")
                    .with_detail("single sign-on is not cancelable right now"));
            }
        }
        self.send_command("cancelSingleSignOn", None).await;
        Ok(())
    }
}

/// The engine wants an identity email. Manual attempts answer with the
/// placeholder; discovery attempts answer from the session, the cache, or
/// the application prompt. A second prompt in one attempt means the last
/// answer was rejected and fails the attempt.
pub(crate) async fn handle_email_required(client: &Arc<Client>, content: &Value) {
    let error = prompt_error(content);
    let (manual, prompted, session_email, user) = {
        let session = client.session.lock().await;
        // The engine can fire a stray prompt after sign-out.
        if !session.registering {
            debug!(target: "Client/SignIn", "email prompt outside a sign-in attempt, ignoring");
            return;
        }
        (
            session.manual,
            session.email_prompted,
            session.email.clone(),
            session.user.clone(),
        )
    };

    if manual {
        if let Some(err) = error {
            session::stop_sign_in_from_email(client, err).await;
        } else {
            set_email_address(client, MANUAL_SIGNIN_EMAIL).await;
        }
        return;
    }

    if prompted {
        let err = error.unwrap_or_else(|| SdkError::from_code("ServiceDiscoveryFailure"));
        session::stop_sign_in_from_email(client, err).await;
        return;
    }
    client.session.lock().await.email_prompted = true;

    if !session_email.is_empty() {
        set_email_address(client, &session_email).await;
        return;
    }

    let hint = match client.store.get(crate::store::CACHED_EMAIL_KEY).await {
        Some(cached) if !cached.is_empty() => cached,
        _ if !user.is_empty() => format!("{user}@"),
        _ => String::new(),
    };

    let callbacks = client.callbacks.clone();
    let prompt = EmailPrompt {
        client: client.clone(),
    };
    let handled = run_callback("email_required", async move {
        callbacks.email_required(prompt, hint).await
    })
    .await
    .unwrap_or(false);
    if !handled {
        session::stop_sign_in_from_email(
            client,
            SdkError::from_code("ServiceDiscoveryMissingOrInvalidCallback"),
        )
        .await;
    }
}

/// Submits the identity email. Accepted values other than the manual
/// placeholder are cached for the next attempt's hint.
pub(crate) async fn set_email_address(client: &Arc<Client>, email: &str) {
    if email.is_empty() || !email.contains('@') {
        session::stop_sign_in_from_email(
            client,
            SdkError::from_code("InvalidUserInput").with_detail("malformed email address"),
        )
        .await;
        return;
    }

    match client
        .send_request("setUserProfileEmailAddress", Some(json!({"email": email})))
        .await
    {
        Ok(_) => {
            {
                let mut session = client.session.lock().await;
                session.email = email.to_string();
                session.registration.email = Some(email.to_string());
            }
            if email != MANUAL_SIGNIN_EMAIL {
                client
                    .store
                    .set(crate::store::CACHED_EMAIL_KEY, email)
                    .await;
            }
        }
        Err(err) => {
            session::stop_sign_in_from_email(
                client,
                err.with_native_request("setUserProfileEmailAddress"),
            )
            .await;
        }
    }
}

/// The home cluster wants credentials. Manual attempts auto-submit the
/// stored pair once; a repeat prompt means they were rejected.
pub(crate) async fn handle_credentials_required(client: &Arc<Client>, content: &Value) {
    let error = prompt_error(content);
    let authenticator = content["authenticatorId"].as_i64();

    let (manual, prompted, user, passphrase) = {
        let mut session = client.session.lock().await;
        if !session.registering {
            debug!(target: "Client/SignIn", "credentials prompt outside a sign-in attempt, ignoring");
            return;
        }
        session.last_authenticator_id = authenticator;
        let prompted = session.credentials_prompted;
        session.credentials_prompted = true;
        (
            session.manual,
            prompted,
            session.user.clone(),
            session.passphrase.clone(),
        )
    };

    if manual {
        if error.is_some() || prompted {
            let err = error.unwrap_or_else(|| SdkError::from_code("AuthenticationFailure"));
            session::stop_sign_in_from_credentials(client, err, authenticator).await;
            return;
        }
        match passphrase {
            Some(passphrase) => set_credentials(client, &user, passphrase, authenticator).await,
            None => {
                session::stop_sign_in_from_credentials(
                    client,
                    SdkError::from_code("AuthenticationFailure")
                        .with_detail("no credentials stored for manual sign-in"),
                    authenticator,
                )
                .await;
            }
        }
        return;
    }

    if prompted
        && let Some(err) = error
    {
        session::stop_sign_in_from_credentials(client, err, authenticator).await;
        return;
    }

    let callbacks = client.callbacks.clone();
    let prompt = CredentialsPrompt {
        client: client.clone(),
        authenticator_id: authenticator,
    };
    let handled = run_callback("credentials_required", async move {
        callbacks.credentials_required(prompt, user).await
    })
    .await
    .unwrap_or(false);
    if !handled {
        session::stop_sign_in_from_credentials(
            client,
            SdkError::from_code("ServiceDiscoveryMissingOrInvalidCallback"),
            authenticator,
        )
        .await;
    }
}

/// Submits credentials for the prompting authenticator. Plaintext
/// passphrases are encrypted through the engine first.
pub(crate) async fn set_credentials(
    client: &Arc<Client>,
    username: &str,
    passphrase: Passphrase,
    authenticator: Option<i64>,
) {
    let passphrase = match super::manual::encrypt_passphrase(client, passphrase).await {
        Ok(p) => p,
        Err(err) => {
            session::stop_sign_in_from_credentials(client, err, authenticator).await;
            return;
        }
    };

    let mut content = json!({
        "username": username,
        "password": passphrase.secret(),
    });
    if let Some(id) = authenticator {
        content["authenticator"] = json!(id);
    }

    match client
        .send_request("setUserProfileCredentials", Some(content))
        .await
    {
        Ok(_) => {
            let mut session = client.session.lock().await;
            session.user = username.to_string();
            session.passphrase = Some(passphrase);
            session.registration.user = Some(username.to_string());
        }
        Err(err) => {
            session::stop_sign_in_from_credentials(
                client,
                err.with_native_request("setUserProfileCredentials"),
                authenticator,
            )
            .await;
        }
    }
}

/// Rewrites the engine's authorization URL to carry this SDK's client id
/// and the configured redirect URI, then hands it to the application.
pub(crate) async fn handle_sso_navigate(client: &Arc<Client>, raw_url: String) {
    if raw_url.is_empty() {
        debug!(target: "Client/SignIn", "sso navigation without a url");
        return;
    }
    let Some(redirect_uri) = client.config.redirect_uri.clone() else {
        session::stop_sign_in(
            client,
            SdkError::from_code("SSOMissingOrInvalidRedirectURI"),
        )
        .await;
        return;
    };
    client.sso.lock().await.in_progress = true;

    let url = rewrite_sso_url(&raw_url, &redirect_uri);
    let broadcast = client
        .event_bus
        .sso_navigate_to
        .send(Arc::new(crate::types::events::SsoNavigation { url: url.clone() }));

    let callbacks = client.callbacks.clone();
    let callback_url = url.clone();
    let handled = run_callback("sso_navigation_required", async move {
        callbacks.sso_navigation_required(callback_url).await
    })
    .await
    .unwrap_or(false);

    if !handled && broadcast.is_err() {
        warn!(target: "Client/SignIn", "nobody can perform the sso navigation");
        session::stop_sign_in(
            client,
            SdkError::from_code("ServiceDiscoveryMissingOrInvalidCallback"),
        )
        .await;
    }
}

/// Replaces the `client_id` and `redirect_uri` query parameters, appending
/// them when the engine's URL lacks them.
fn rewrite_sso_url(raw: &str, redirect_uri: &str) -> String {
    let (base, query) = match raw.split_once('?') {
        Some((base, query)) => (base, query),
        None => (raw, ""),
    };
    let encoded_redirect = urlencoding::encode(redirect_uri);

    let mut saw_client_id = false;
    let mut saw_redirect = false;
    let mut params: Vec<String> = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let key = pair.split('=').next().unwrap_or("");
        match key {
            "client_id" => {
                saw_client_id = true;
                params.push(format!("client_id={SSO_CLIENT_ID}"));
            }
            "redirect_uri" => {
                saw_redirect = true;
                params.push(format!("redirect_uri={encoded_redirect}"));
            }
            _ => params.push(pair.to_string()),
        }
    }
    if !saw_client_id {
        params.push(format!("client_id={SSO_CLIENT_ID}"));
    }
    if !saw_redirect {
        params.push(format!("redirect_uri={encoded_redirect}"));
    }
    format!("{base}?{}", params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_sso_query_parameters() {
        let url = rewrite_sso_url(
            "https://idp.example.com/authorize?response_type=code&client_id=engine&redirect_uri=http%3A%2F%2Flocal",
            "https://app.example.com/sso",
        );
        assert!(url.starts_with("https://idp.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains(&format!("client_id={SSO_CLIENT_ID}")));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fsso"));
        assert!(!url.contains("client_id=engine"));
    }

    #[test]
    fn appends_missing_sso_parameters() {
        let url = rewrite_sso_url("https://idp.example.com/authorize", "https://app/cb");
        assert!(url.contains(&format!("client_id={SSO_CLIENT_ID}")));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp%2Fcb"));
    }

    #[test]
    fn prompt_error_reads_errors_list() {
        let err = prompt_error(&json!({"errors": ["InvalidCredential"]})).unwrap();
        assert_eq!(err.code, "AuthenticationFailure");
        assert!(prompt_error(&json!({})).is_none());
    }
}
