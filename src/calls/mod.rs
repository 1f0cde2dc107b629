pub mod control;
pub mod reconcile;
pub mod video;

use crate::types::{CallId, Conversation};
use std::collections::HashMap;

/// Reconciliation state: the event-facing records plus the raw last-seen
/// snapshot per call for duplicate suppression.
#[derive(Default)]
pub(crate) struct CallTable {
    pub records: HashMap<CallId, Conversation>,
    pub last_seen: HashMap<CallId, Conversation>,
    /// Call the client asked to end. The engine echoes one more Connected
    /// snapshot for it, which must not resurrect the call.
    pub ending: Option<CallId>,
}

/// Attended-transfer progress, reported by the engine.
#[derive(Default)]
pub(crate) struct TransferState {
    pub in_progress: bool,
    pub call_id: Option<CallId>,
}
