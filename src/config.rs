use serde::{Deserialize, Serialize};

/// Static client configuration, fixed for the lifetime of a [`crate::client::Client`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix used by device-name prediction when switching to softphone
    /// mode without an explicit device name.
    pub device_prefix: String,
    /// OAuth2 redirect URI appended to single sign-on authorization URLs.
    /// SSO sign-in fails with `SSOMissingOrInvalidRedirectURI` when unset.
    pub redirect_uri: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device_prefix: "ecp".to_string(),
            redirect_uri: None,
        }
    }
}

impl ClientConfig {
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_device_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.device_prefix = prefix.into();
        self
    }

    /// Default softphone device name for a user, `device_prefix` plus the
    /// username. Returns an empty name when no user is known.
    pub fn predict_device(&self, username: &str) -> String {
        if username.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.device_prefix, username)
        }
    }
}
