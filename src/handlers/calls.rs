use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::types::CallId;
use crate::types::events::TransferInProgress;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

pub struct CallStateHandler;

#[async_trait]
impl MessageHandler for CallStateHandler {
    fn name(&self) -> &'static str {
        "callstatechange"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        crate::calls::reconcile::process_snapshot_value(&client, message.content.clone()).await;
        true
    }
}

/// A resolution change is a partial snapshot: only the call id and the new
/// resolution, patched onto the stored record.
pub struct VideoResolutionHandler;

#[async_trait]
impl MessageHandler for VideoResolutionHandler {
    fn name(&self) -> &'static str {
        "videoresolutionchange"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let id: CallId = match serde_json::from_value(message.content["callId"].clone()) {
            Ok(id) => id,
            Err(_) => {
                debug!(target: "Client/Calls", "video resolution change without call id");
                return true;
            }
        };
        let updated = {
            let mut calls = client.calls.lock().await;
            match calls.records.get_mut(&id) {
                Some(record) => {
                    record.video_resolution = Some(message.content["videoResolution"].clone());
                    Some(record.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(record) => {
                client
                    .event_bus
                    .conversation_updated
                    .send(Arc::new(record))
                    .ok();
            }
            None => {
                debug!(target: "Client/Calls", "video resolution change for unknown call {id}");
            }
        }
        true
    }
}

pub struct AttendedTransferHandler;

#[async_trait]
impl MessageHandler for AttendedTransferHandler {
    fn name(&self) -> &'static str {
        "attendedtransferstatechange"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        // Transfer state changes without a call id carry nothing actionable.
        let id: CallId = match serde_json::from_value(message.content["callId"].clone()) {
            Ok(id) => id,
            Err(_) => return true,
        };
        let state = message.content["state"].as_str().unwrap_or("");
        let mut transfer = client.transfer.lock().await;
        if state == "InProgress" {
            transfer.in_progress = true;
            transfer.call_id = Some(id.clone());
            client
                .event_bus
                .transfer_in_progress
                .send(Arc::new(TransferInProgress { call_id: id }))
                .ok();
        } else {
            transfer.in_progress = false;
            transfer.call_id = None;
        }
        true
    }
}
