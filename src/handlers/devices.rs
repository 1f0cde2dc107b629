use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::signin::device_select;
use crate::types::events::{MultimediaCapability, RingtoneUpdate};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// The engine fires one device-change message per device during bring-up.
/// A short trailing-edge debounce collapses the burst into one refresh.
const DEVICE_CHANGE_DEBOUNCE: Duration = Duration::from_millis(20);

pub struct TelephonyDevicesHandler;

#[async_trait]
impl MessageHandler for TelephonyDevicesHandler {
    fn name(&self) -> &'static str {
        "telephonydeviceschange"
    }

    async fn handle(&self, client: Arc<Client>, _message: &ServerMessage) -> bool {
        let mut media = client.media.lock().await;
        if let Some(previous) = media.devices_debounce.take() {
            previous.abort();
        }
        let task_client = client.clone();
        media.devices_debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(DEVICE_CHANGE_DEBOUNCE).await;
            device_select::telephony_devices_changed(&task_client).await;
        }));
        true
    }
}

async fn broadcast_multimedia_devices(client: &Arc<Client>) {
    if let Ok(content) = client.send_request("getMultimediaDevices", None).await {
        client
            .event_bus
            .multimedia_devices
            .send(Arc::new(content))
            .ok();
    }
}

pub struct MultimediaStartedHandler;

#[async_trait]
impl MessageHandler for MultimediaStartedHandler {
    fn name(&self) -> &'static str {
        "multimediacapabilitiesstarted"
    }

    async fn handle(&self, client: Arc<Client>, _message: &ServerMessage) -> bool {
        let pending = {
            let mut media = client.media.lock().await;
            media.multimedia_started = true;
            media.pending_connect.take()
        };
        client
            .event_bus
            .multimedia_capability
            .send(Arc::new(MultimediaCapability { started: true }))
            .ok();

        if let Some(connect) = pending {
            debug!(target: "Client/Devices", "replaying deferred connect to {}", connect.device_name);
            device_select::send_connect(&client, &connect.device_name, &connect.line_dn).await;
        }
        broadcast_multimedia_devices(&client).await;
        true
    }
}

pub struct MultimediaStoppedHandler;

#[async_trait]
impl MessageHandler for MultimediaStoppedHandler {
    fn name(&self) -> &'static str {
        "multimediacapabilitiesstopped"
    }

    async fn handle(&self, client: Arc<Client>, _message: &ServerMessage) -> bool {
        client.media.lock().await.multimedia_started = false;
        client
            .event_bus
            .multimedia_capability
            .send(Arc::new(MultimediaCapability { started: false }))
            .ok();
        true
    }
}

pub struct MultimediaDeviceChangeHandler;

#[async_trait]
impl MessageHandler for MultimediaDeviceChangeHandler {
    fn name(&self) -> &'static str {
        "multimediadevicechange"
    }

    async fn handle(&self, client: Arc<Client>, _message: &ServerMessage) -> bool {
        // Before capabilities start the device list is not queryable.
        let started = client.media.lock().await.multimedia_started;
        if started {
            broadcast_multimedia_devices(&client).await;
        }
        true
    }
}

pub struct RingtoneHandler;

#[async_trait]
impl MessageHandler for RingtoneHandler {
    fn name(&self) -> &'static str {
        "ringtonechanged"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let ringtone = message.content["ringtone"]
            .as_str()
            .or_else(|| message.content.as_str())
            .unwrap_or("")
            .to_string();
        client
            .event_bus
            .ringtone_changed
            .send(Arc::new(RingtoneUpdate { ringtone }))
            .ok();
        true
    }
}
