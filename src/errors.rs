use serde::Serialize;
use thiserror::Error;

/// One immutable entry of the error catalog. `code` doubles as the lookup
/// key; `message` is the human-readable default text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub code: &'static str,
    pub message: &'static str,
}

/// The error surface handed to applications, carried on the error event and
/// returned from every fallible request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct SdkError {
    pub code: &'static str,
    pub message: &'static str,
    /// Raw engine code that resolved to this entry, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_error: Option<String>,
    /// Request name that produced the error, for request-scoped failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SdkError {
    pub fn new(entry: &ErrorEntry) -> Self {
        Self {
            code: entry.code,
            message: entry.message,
            native_error: None,
            native_request: None,
            detail: None,
        }
    }

    /// Resolve `code` through the alias table and catalog, falling back to
    /// `Unknown` like [`resolve`] does.
    pub fn from_code(code: &str) -> Self {
        let entry = resolve(Some(code), None);
        Self::new(entry).with_native_error(code)
    }

    pub fn with_native_error(mut self, raw: impl Into<String>) -> Self {
        self.native_error = Some(raw.into());
        self
    }

    pub fn with_native_request(mut self, name: impl Into<String>) -> Self {
        self.native_request = Some(name.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_no_error(&self) -> bool {
        self.code == "NoError"
    }
}

macro_rules! catalog {
    ($($name:ident => $message:expr),* $(,)?) => {
        static CATALOG: &[ErrorEntry] = &[
            $(ErrorEntry { code: stringify!($name), message: $message },)*
        ];
    };
}

catalog! {
    Unknown => "Unknown error",
    PluginNotAvailable => "Plugin not available",
    ExtensionNotAvailable => "Browser extension not available",
    BrowserNotSupported => "Browser not supported",
    InvalidArguments => "Invalid arguments",
    InvalidState => "Invalid State",
    NativePluginError => "Native plugin error",
    OperationNotSupported => "Operation not supported",
    InvalidTFTPServer => "The configured TFTP server is incorrect",
    InvalidCCMCIPServer => "The configured CCMCIP server is incorrect",
    InvalidCTIServer => "The configured CTI server is incorrect",
    ReleaseMismatch => "Release mismatch",
    NoDevicesFound => "No devices found",
    TooManyPluginInstances => "Too many plug-in instances",
    AuthenticationFailure => "Authentication failed",
    SignInError => "Sign-in Error",
    CallControlError => "Call control error",
    PhoneConfigGenError => "Phone configuration error",
    CreateCallError => "Cannot create call",
    NetworkError => "Network error",
    VideoWindowError => "Video window error",
    CapabilityMissing => "Capability Missing",
    NotUserAuthorized => "User did not authorize access",
    OperationFailed => "Operation Failed",
    ServiceDiscoveryMissingOrInvalidCallback => "Service Discovery Error - Callback not implemented or exception occured",
    SSOMissingOrInvalidRedirectURI => "Redirect URI missing or invalid",
    InvalidUserInput => "Invalid user input",
    CertificateError => "Certificate error",
    InvalidURLFragment => "Invalid URL fragment received",
    ErrorReadingConfig => "Error reading config",
    UnexpectedLifecycleState => "Unexpected application lifecycle state",
    SSOStartSessionError => "SSO start session error",
    SSOCanceled => "SSO canceled",
    SSOInvalidUserSwitch => "Invalid user switch",
    SSOSessionExpired => "SSO session expired",
    ServiceDiscoveryFailure => "Cannot find services automatically",
    CannotConnectToServer => "Cannot connect to CUCM server",
    SelectDeviceFailure => "Connecting to phone device failed",
    NoError => "No error",
}

/// Raw engine codes that map onto a catalog entry under a different name.
static ALIASES: &[(&str, &str)] = &[
    // Api return codes
    ("eCreateCallFailed", "CreateCallError"),
    ("eCallOperationFailed", "CallControlError"),
    ("eNoActiveDevice", "PhoneConfigGenError"),
    ("eLoggedInLock", "TooManyPluginInstances"),
    ("eLogoutFailed", "SignInError"),
    ("eNoWindowExists", "VideoWindowError"),
    ("eInvalidWindowIdOrObject", "VideoWindowError"),
    ("eWindowAlreadyExists", "VideoWindowError"),
    ("eNoPhoneMode", "InvalidArguments"),
    ("eInvalidArgument", "InvalidArguments"),
    ("eOperationNotSupported", "OperationNotSupported"),
    ("eCapabilityMissing", "CapabilityMissing"),
    ("eNotUserAuthorized", "NotUserAuthorized"),
    ("eSyntaxError", "NativePluginError"),
    ("eOperationFailed", "OperationFailed"),
    ("eInvalidCallId", "InvalidArguments"),
    ("eInvalidState", "InvalidState"),
    ("eNoError", "NoError"),
    ("eUnknownServiceEvent", "Unknown"),
    ("Ok", "NoError"),
    // Telephony service event codes
    ("DeviceRegNoDevicesFound", "NoDevicesFound"),
    ("NoCredentialsConfiguredServerHealth", "AuthenticationFailure"),
    ("InvalidCredential", "AuthenticationFailure"),
    ("InvalidCredentialServerHealth", "AuthenticationFailure"),
    ("NoNetwork", "NetworkError"),
    ("TLSFailure", "NetworkError"),
    ("SSLConnectError", "NetworkError"),
    ("ServerConnectionFailure", "CannotConnectToServer"),
    ("ServerAuthenticationFailure", "AuthenticationFailure"),
    ("InValidConfig", "AuthenticationFailure"),
    ("ServerCertificateRejected", "CertificateError"),
    ("InvalidToken", "AuthenticationFailure"),
    ("InvalidAuthorisationTokenServerHealth", "AuthenticationFailure"),
    // System service event codes
    ("InvalidStartupHandlerState", "UnexpectedLifecycleState"),
    ("InvalidLifeCycleState", "UnexpectedLifecycleState"),
    ("InvalidCertRejected", "CertificateError"),
    ("SSOPageLoadError", "UnexpectedLifecycleState"),
    ("SSOUnknownError", "UnexpectedLifecycleState"),
    ("SSOCancelled", "SSOCanceled"),
    ("SSOCertificateError", "CertificateError"),
    ("SSOWhoAmIFailure", "SSOStartSessionError"),
    ("ServiceDiscoveryAuthenticationFailure", "AuthenticationFailure"),
    ("ServiceDiscoveryCannotConnectToCucmServer", "CannotConnectToServer"),
    ("ServiceDiscoveryNoCucmConfiguration", "ServiceDiscoveryFailure"),
    ("ServiceDiscoveryNoSRVRecordsFound", "ServiceDiscoveryFailure"),
    ("ServiceDiscoveryCannotConnectToEdge", "CannotConnectToServer"),
    ("ServiceDiscoveryNoNetworkConnectivity", "NetworkError"),
    ("ServiceDiscoveryUntrustedCertificate", "CertificateError"),
];

pub fn catalog_entry(code: &str) -> Option<&'static ErrorEntry> {
    CATALOG.iter().find(|e| e.code == code)
}

fn alias_entry(code: &str) -> Option<&'static ErrorEntry> {
    ALIASES
        .iter()
        .find(|(raw, _)| *raw == code)
        .and_then(|(_, target)| catalog_entry(target))
}

/// Resolve a raw engine code to a catalog entry.
///
/// Lookup order: alias(primary), catalog(primary), alias(backup),
/// catalog(backup), then the `Unknown` entry.
pub fn resolve(primary: Option<&str>, backup: Option<&str>) -> &'static ErrorEntry {
    primary
        .and_then(|c| alias_entry(c).or_else(|| catalog_entry(c)))
        .or_else(|| backup.and_then(|c| alias_entry(c).or_else(|| catalog_entry(c))))
        .unwrap_or_else(|| catalog_entry("Unknown").unwrap())
}

pub fn unknown() -> &'static ErrorEntry {
    catalog_entry("Unknown").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_alias_before_catalog() {
        assert_eq!(
            resolve(Some("eInvalidArgument"), None).code,
            "InvalidArguments"
        );
        // A key present in both tables resolves through the alias first.
        assert_eq!(
            resolve(Some("SelectDeviceFailure"), None).code,
            "SelectDeviceFailure"
        );
    }

    #[test]
    fn falls_back_to_backup_then_unknown() {
        assert_eq!(
            resolve(Some("nonsense"), Some("TLSFailure")).code,
            "NetworkError"
        );
        assert_eq!(resolve(Some("nonsense"), Some("also-nonsense")).code, "Unknown");
        assert_eq!(resolve(None, None).code, "Unknown");
    }

    #[test]
    fn no_error_sentinel() {
        assert!(SdkError::from_code("eNoError").is_no_error());
        assert!(!SdkError::from_code("eInvalidState").is_no_error());
    }

    #[test]
    fn error_carries_request_context() {
        let err =
            SdkError::from_code("ServerConnectionFailure").with_native_request("startSignIn");
        assert_eq!(err.code, "CannotConnectToServer");
        assert_eq!(err.native_error.as_deref(), Some("ServerConnectionFailure"));
        assert_eq!(err.native_request.as_deref(), Some("startSignIn"));
    }
}
