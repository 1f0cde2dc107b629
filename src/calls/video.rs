use crate::client::Client;
use crate::errors::SdkError;
use crate::types::CallId;
use log::debug;
use serde_json::{Value, json};
use std::sync::Arc;

/// The single remote-video attachment. At most one call renders remote
/// video at a time; `last_call` survives detach so that reattaching to the
/// same call skips the expensive video restart.
#[derive(Default)]
pub(crate) struct ActiveVideo {
    pub window: Option<Value>,
    pub last_call: Option<CallId>,
}

/// Attaches `window` to the call, starting remote video when the call is
/// not the one video was last running on.
pub(crate) async fn attach(client: &Arc<Client>, id: &CallId, window: Value) {
    let start = {
        let mut video = client.video.lock().await;
        let start = video.last_call.as_ref() != Some(id);
        video.last_call = Some(id.clone());
        video.window = Some(window.clone());
        start
    };
    if start {
        client
            .send_command(
                "startRemoteVideo",
                Some(json!({"callId": id, "windowhandle": window})),
            )
            .await;
    } else {
        client
            .send_command(
                "addWindowToCall",
                Some(json!({"callId": id, "windowhandle": window})),
            )
            .await;
    }
}

/// Ended-call cleanup from reconciliation: stop remote video when the
/// ending call owns the attachment.
pub(crate) async fn release_on_end(client: &Arc<Client>, id: &CallId) {
    let release = {
        let mut video = client.video.lock().await;
        if video.last_call.as_ref() == Some(id) && video.window.is_some() {
            video.window = None;
            true
        } else {
            false
        }
    };
    if release {
        debug!(target: "Client/Video", "stopping remote video for ended call {id}");
        client
            .send_command("stopRemoteVideo", Some(json!({"callId": id})))
            .await;
    }
}

impl Client {
    /// Attaches the remote-video window to a call. Only one call can hold
    /// the attachment; attaching to another call moves it.
    pub async fn add_remote_video_window(self: &Arc<Self>, id: &CallId, window: Value) {
        attach(self, id, window).await;
    }

    /// Detaches the remote-video window from the call it is attached to.
    /// `end_call` stops remote video entirely instead of just releasing the
    /// window.
    pub async fn remove_remote_video_window(
        self: &Arc<Self>,
        id: &CallId,
        end_call: bool,
    ) -> Result<(), SdkError> {
        let window = {
            let mut video = self.video.lock().await;
            if video.last_call.as_ref() != Some(id) {
                return Err(SdkError::from_code("eNoWindowExists")
                    .with_detail("video is not attached to this call"));
            }
            video.window.take()
        };
        if end_call {
            self.send_command("stopRemoteVideo", Some(json!({"callId": id})))
                .await;
        } else {
            self.send_command(
                "removeWindowFromCall",
                Some(json!({"callId": id, "windowhandle": window})),
            )
            .await;
        }
        Ok(())
    }
}
