use crate::errors::SdkError;
use crate::signin::session::Registration;
use crate::types::call::{CallId, Conversation};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

/// Phone/system status notification, emitted on every connection-status
/// change. `ready` is only true for the registered-and-ready state.
#[derive(Debug, Clone)]
pub struct SystemUpdate {
    /// Raw engine connection status (`eIdle`, `eRegistering`, `eReady`).
    pub status: String,
    pub ready: bool,
    pub registration: Registration,
}

/// The application must navigate a window to `url` to continue single
/// sign-on.
#[derive(Debug, Clone)]
pub struct SsoNavigation {
    pub url: String,
}

/// An attended transfer is in progress and can be completed with
/// [`crate::client::Client::complete_transfer`].
#[derive(Debug, Clone)]
pub struct TransferInProgress {
    pub call_id: CallId,
}

/// The engine could not validate a certificate and wants a decision.
#[derive(Debug, Clone)]
pub struct CertificateAlert {
    pub fingerprint: String,
    pub identifier_to_display: Option<String>,
    pub subject_cn: Option<String>,
    pub reference_id: Option<String>,
    pub invalid_reasons: Vec<String>,
    pub allow_user_to_accept: bool,
    pub persist_accepted_decision: bool,
    /// Full payload for applications that render certificate details.
    pub raw: Value,
}

#[derive(Debug, Clone)]
pub struct MultimediaCapability {
    pub started: bool,
}

#[derive(Debug, Clone)]
pub struct RingtoneUpdate {
    pub ringtone: String,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event type.
        /// Subscribers that lag simply miss events; nothing blocks the
        /// dispatch loop.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Conversation lifecycle, ordered per call by the reconciliation engine
    (conversation_incoming, Arc<Conversation>),
    (conversation_started, Arc<Conversation>),
    (conversation_updated, Arc<Conversation>),
    (conversation_ended, Arc<Conversation>),

    // Sign-in and system state
    (system, Arc<SystemUpdate>),
    (signed_in, Arc<()>),
    (sso_navigate_to, Arc<SsoNavigation>),
    (invalid_certificate, Arc<CertificateAlert>),

    // Call features
    (transfer_in_progress, Arc<TransferInProgress>),
    (ringtone_changed, Arc<RingtoneUpdate>),

    // Media plumbing
    (multimedia_capability, Arc<MultimediaCapability>),
    (multimedia_devices, Arc<Value>),

    // Errors
    (error, Arc<SdkError>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
