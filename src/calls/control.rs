use crate::client::Client;
use crate::errors::SdkError;
use crate::types::CallId;
use log::info;
use serde_json::{Value, json};
use std::sync::Arc;

/// The in-call state changes an application can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationUpdate {
    Hold,
    Resume,
    MuteAudio,
    UnmuteAudio,
    MuteVideo,
    UnmuteVideo,
}

impl ConversationUpdate {
    fn request(self, call_id: &CallId) -> (&'static str, Value) {
        match self {
            ConversationUpdate::Hold => ("hold", json!({"callId": call_id})),
            ConversationUpdate::Resume => ("resume", json!({"callId": call_id})),
            ConversationUpdate::MuteAudio => {
                ("mute", json!({"callId": call_id, "muteAudio": true}))
            }
            ConversationUpdate::UnmuteAudio => {
                ("unmute", json!({"callId": call_id, "muteAudio": true}))
            }
            ConversationUpdate::MuteVideo => {
                ("mute", json!({"callId": call_id, "muteVideo": true}))
            }
            ConversationUpdate::UnmuteVideo => {
                ("unmute", json!({"callId": call_id, "muteVideo": true}))
            }
        }
    }
}

fn valid_dtmf(digits: &str) -> bool {
    !digits.is_empty()
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '#' || matches!(c, 'A'..='D' | 'a'..='d'))
}

impl Client {
    /// Places an outgoing call. Resolves with the engine-assigned call id;
    /// conversation events follow through the event bus.
    pub async fn start_conversation(
        self: &Arc<Self>,
        recipient: &str,
        video_direction: Option<&str>,
    ) -> Result<CallId, SdkError> {
        if recipient.trim().is_empty() {
            return Err(SdkError::from_code("InvalidArguments")
                .with_detail("recipient must not be empty"));
        }
        let mut content = json!({"recipient": recipient});
        if let Some(direction) = video_direction {
            content["videoDirection"] = json!(direction);
        }
        let reply = self.send_request("originate", Some(content)).await?;
        let id: CallId = serde_json::from_value(reply["callId"].clone()).map_err(|_| {
            SdkError::from_code("eCreateCallFailed").with_native_request("originate")
        })?;
        if id.as_u64().is_none_or(|n| n < 1) {
            return Err(SdkError::from_code("eCreateCallFailed").with_native_request("originate"));
        }
        info!(target: "Client/Calls", "originated call {id}");

        // A video window registered up front rides along on the new call.
        let window = self.video.lock().await.window.clone();
        if let Some(window) = window {
            super::video::attach(self, &id, window).await;
        }
        Ok(id)
    }

    /// Answers an incoming call.
    pub async fn answer_conversation(self: &Arc<Self>, id: &CallId, video_direction: Option<&str>) {
        let mut content = json!({"callId": id});
        if let Some(direction) = video_direction {
            content["videoDirection"] = json!(direction);
        }
        if let Some(window) = self.video.lock().await.window.clone() {
            content["windowhandle"] = window;
        }
        self.send_command("answer", Some(content)).await;
    }

    /// Ends a call. Ending the target of an attended transfer abandons the
    /// transfer; `divert` sends the call to voicemail and requires the
    /// matching capability.
    pub async fn end_conversation(
        self: &Arc<Self>,
        id: &CallId,
        divert: bool,
    ) -> Result<(), SdkError> {
        {
            // Ending the transfer target abandons the attended transfer.
            let mut transfer = self.transfer.lock().await;
            if transfer.call_id.as_ref() == Some(id) {
                transfer.in_progress = false;
                transfer.call_id = None;
            }
        }

        if divert {
            let can_divert = {
                let calls = self.calls.lock().await;
                calls
                    .records
                    .get(id)
                    .is_some_and(|c| c.capabilities.can_immediate_divert)
            };
            if !can_divert {
                return Err(SdkError::from_code("eCapabilityMissing")
                    .with_detail("call cannot be diverted"));
            }
            self.send_command("iDivert", Some(json!({"callId": id})))
                .await;
            return Ok(());
        }

        self.calls.lock().await.ending = Some(id.clone());
        self.send_command("endCall", Some(json!({"callId": id})))
            .await;
        Ok(())
    }

    /// Applies one hold/resume/mute change to a call.
    pub async fn update_conversation(self: &Arc<Self>, id: &CallId, update: ConversationUpdate) {
        let (name, content) = update.request(id);
        self.send_command(name, Some(content)).await;
    }

    /// Starts an attended transfer of `id` to `number`. Refused while
    /// another transfer is running.
    pub async fn transfer_call(self: &Arc<Self>, id: &CallId, number: &str) -> Result<(), SdkError> {
        if number.trim().is_empty() {
            return Err(SdkError::from_code("InvalidArguments")
                .with_detail("transfer target must not be empty"));
        }
        if self.transfer.lock().await.in_progress {
            return Err(SdkError::from_code("InvalidState")
                .with_detail("a transfer is already in progress"));
        }
        self.send_command(
            "transferCall",
            Some(json!({"callId": id, "transferToNumber": number})),
        )
        .await;
        Ok(())
    }

    /// Completes the attended transfer the engine reported as in progress.
    pub async fn complete_transfer(self: &Arc<Self>) -> Result<(), SdkError> {
        let id = {
            let mut transfer = self.transfer.lock().await;
            if !transfer.in_progress {
                return Err(SdkError::from_code("InvalidState")
                    .with_detail("no transfer in progress"));
            }
            transfer.in_progress = false;
            transfer.call_id.take()
        };
        self.send_command("completeTransfer", Some(json!({"callId": id})))
            .await;
        Ok(())
    }

    /// Joins `source` into `target` (conference / join-across-line).
    pub async fn join_calls(self: &Arc<Self>, source: &CallId, target: &CallId) {
        self.send_command(
            "joinCalls",
            Some(json!({"joinCallId": source, "callId": target})),
        )
        .await;
    }

    pub async fn set_video_direction(self: &Arc<Self>, id: &CallId, direction: &str) {
        self.send_command(
            "setVideoDirection",
            Some(json!({"callId": id, "videoDirection": direction})),
        )
        .await;
    }

    /// Sends DTMF digits on a call. Digits are validated locally and never
    /// written to the log.
    pub async fn send_dtmf(self: &Arc<Self>, id: &CallId, digits: &str) -> Result<(), SdkError> {
        if !valid_dtmf(digits) {
            return Err(SdkError::from_code("InvalidArguments")
                .with_detail("digits must be 0-9, *, # or A-D"));
        }
        self.send_command("sendDTMF", Some(json!({"callId": id, "digits": digits})))
            .await;
        Ok(())
    }
}
