use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Engine-assigned call identifier. Arrives on the wire as either a JSON
/// number or a string, so it is kept as a string key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CallId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        match v {
            Value::String(s) => Ok(CallId(s)),
            Value::Number(n) => Ok(CallId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "callId must be a number or string, got {other}"
            ))),
        }
    }
}

/// Engine call states. Unrecognized states deserialize as `Unknown` rather
/// than failing the whole snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    OnHook,
    OffHook,
    Ringout,
    Ringin,
    Proceed,
    Connected,
    Hold,
    RemHold,
    Resume,
    Busy,
    Reorder,
    Conference,
    Dialing,
    RemInUse,
    HoldRevert,
    Whisper,
    Parked,
    ParkRevert,
    ParkRetrieved,
    Preservation,
    WaitingForDigits,
    #[serde(rename = "Spoof_Ringout")]
    SpoofRingout,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub can_originate_call: bool,
    pub can_answer_call: bool,
    pub can_end_call: bool,
    pub can_hold: bool,
    pub can_resume: bool,
    pub can_mute_audio: bool,
    pub can_unmute_audio: bool,
    pub can_mute_video: bool,
    pub can_unmute_video: bool,
    pub can_direct_transfer: bool,
    pub can_immediate_divert: bool,
    pub can_join_across_line: bool,
    pub can_update_video: bool,
    pub can_send_digit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Participant {
    pub name: Option<String>,
    pub number: Option<String>,
    pub directory_number: Option<String>,
    /// Normalized dialable address: the directory number when non-empty,
    /// else the raw number. Filled in by reconciliation, never on the wire.
    #[serde(skip_deserializing)]
    pub recipient: Option<String>,
}

impl Participant {
    pub fn recipient_address(&self) -> Option<String> {
        match self.directory_number.as_deref() {
            Some(dn) if !dn.is_empty() => Some(dn.to_string()),
            _ => self.number.clone(),
        }
    }
}

fn default_exists() -> bool {
    true
}

/// One engine snapshot of a call, plus the client-side fields reconciliation
/// layers on top (normalized participant, start/connect stamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conversation {
    #[serde(rename = "callId")]
    pub id: CallId,
    #[serde(rename = "callState")]
    pub state: ConversationState,
    pub call_type: Option<String>,
    #[serde(default = "default_exists")]
    pub exists: bool,
    pub is_conference: bool,
    pub audio_muted: bool,
    pub video_muted: bool,
    pub video_direction: Option<String>,
    pub video_resolution: Option<Value>,
    pub capabilities: Capabilities,
    pub local_participant: Option<Participant>,
    pub participants: Vec<Participant>,
    /// First remote participant with its recipient address resolved.
    #[serde(skip_deserializing)]
    pub participant: Option<Participant>,
    /// Stamped when the start event fires, once per call.
    #[serde(skip_deserializing)]
    pub start: Option<DateTime<Utc>>,
    /// Stamped on the first Connected snapshot.
    #[serde(skip_deserializing)]
    pub connect: Option<DateTime<Utc>>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            id: CallId::default(),
            state: ConversationState::Unknown,
            call_type: None,
            exists: true,
            is_conference: false,
            audio_muted: false,
            video_muted: false,
            video_direction: None,
            video_resolution: None,
            capabilities: Capabilities::default(),
            local_participant: None,
            participants: Vec::new(),
            participant: None,
            start: None,
            connect: None,
        }
    }
}

impl Conversation {
    /// Field-wise equality used by duplicate suppression. The call state is
    /// deliberately not part of the comparison; callers gate on it
    /// separately. Participant lists compare by length only, matching how
    /// shallow the engine's own snapshots are.
    pub fn duplicate_of(&self, other: &Conversation) -> bool {
        self.audio_muted == other.audio_muted
            && self.call_type == other.call_type
            && self.is_conference == other.is_conference
            && self.exists == other.exists
            && self.video_direction == other.video_direction
            && self.video_muted == other.video_muted
            && self.capabilities == other.capabilities
            && self.local_participant == other.local_participant
            && self.participant == other.participant
            && self.participants.len() == other.participants.len()
            && self.video_resolution == other.video_resolution
    }

    /// Merge a fresh snapshot over a stored record, keeping the stamps and
    /// any fields the new snapshot does not carry.
    pub fn merged_over(&self, previous: &Conversation) -> Conversation {
        let mut merged = self.clone();
        merged.start = previous.start;
        merged.connect = previous.connect;
        if merged.state == ConversationState::Unknown {
            merged.state = previous.state;
        }
        if merged.participant.is_none() {
            merged.participant = previous.participant.clone();
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_id_deserializes_from_number_or_string() {
        let c: Conversation =
            serde_json::from_value(json!({"callId": 7, "callState": "Ringin"})).unwrap();
        assert_eq!(c.id, CallId::new("7"));
        assert_eq!(c.state, ConversationState::Ringin);

        let c: Conversation =
            serde_json::from_value(json!({"callId": "12", "callState": "Spoof_Ringout"})).unwrap();
        assert_eq!(c.id.as_u64(), Some(12));
        assert_eq!(c.state, ConversationState::SpoofRingout);
    }

    #[test]
    fn unknown_state_does_not_fail_the_snapshot() {
        let c: Conversation =
            serde_json::from_value(json!({"callId": 1, "callState": "SomethingNew"})).unwrap();
        assert_eq!(c.state, ConversationState::Unknown);
    }

    #[test]
    fn missing_exists_defaults_to_present() {
        let c: Conversation = serde_json::from_value(json!({"callId": 1})).unwrap();
        assert!(c.exists);
    }

    #[test]
    fn recipient_prefers_directory_number() {
        let p = Participant {
            number: Some("+14085550100".into()),
            directory_number: Some("1001".into()),
            ..Default::default()
        };
        assert_eq!(p.recipient_address().as_deref(), Some("1001"));

        let p = Participant {
            number: Some("+14085550100".into()),
            directory_number: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(p.recipient_address().as_deref(), Some("+14085550100"));
    }

    #[test]
    fn duplicate_ignores_state_and_stamps() {
        let a: Conversation = serde_json::from_value(json!({
            "callId": 3, "callState": "Connected", "audioMuted": false
        }))
        .unwrap();
        let mut b = a.clone();
        b.state = ConversationState::Hold;
        b.start = Some(Utc::now());
        assert!(a.duplicate_of(&b));

        b.audio_muted = true;
        assert!(!a.duplicate_of(&b));
    }
}
