use super::session;
use super::{DeviceSelector, run_callback};
use crate::client::{Client, PendingConnect};
use crate::errors::SdkError;
use crate::types::device::{DeviceChoice, PhoneDevice, PhoneMode};
use log::{debug, info};
use serde_json::json;
use std::sync::Arc;

/// Model string of the built-in softphone device, as CUCM reports it.
const SOFTPHONE_MODEL: &str = "cisco unified client services framework";

fn normalized_model(device: &PhoneDevice) -> String {
    device
        .model_description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Default device choice when the application installs no picker.
///
/// Softphone mode prefers the client-services-framework device, then a
/// device matching the predicted name, then any softphone. Deskphone mode
/// takes the first deskphone; its first line comes along.
pub(crate) fn pick_default(
    devices: &[PhoneDevice],
    mode: PhoneMode,
    predicted: &str,
) -> Option<DeviceChoice> {
    let device = match mode {
        PhoneMode::SoftPhone => devices
            .iter()
            .find(|d| d.is_soft_phone && normalized_model(d) == SOFTPHONE_MODEL)
            .or_else(|| {
                devices
                    .iter()
                    .find(|d| d.is_soft_phone && d.name.eq_ignore_ascii_case(predicted))
            })
            .or_else(|| devices.iter().find(|d| d.is_soft_phone)),
        PhoneMode::DeskPhone => devices.iter().find(|d| d.is_desk_phone),
    }?;
    let line_dn = match mode {
        PhoneMode::SoftPhone => String::new(),
        PhoneMode::DeskPhone => device.line_dns.first().cloned().unwrap_or_default(),
    };
    Some(DeviceChoice {
        device_name: device.name.clone(),
        line_dn,
    })
}

/// The (debounced) telephony device list changed. Refresh the registration
/// view and, when a sign-in is waiting on devices, drive selection.
pub(crate) async fn telephony_devices_changed(client: &Arc<Client>) {
    let state = client.engine.lock().await.connection_status.clone();
    session::refresh_registration(client, &state).await;

    let should_select = {
        let mut session = client.session.lock().await;
        session.telephony_devices_set = true;
        session.registering && session.connect_on_auth
    };
    if should_select {
        proceed_with_device_selection(client).await;
    }
}

/// Offers the device list to the application, falling back to the default
/// picker. Runs once authentication has landed and devices are known.
pub(crate) async fn proceed_with_device_selection(client: &Arc<Client>) {
    let (devices, mode, user) = {
        let session = client.session.lock().await;
        let devices: Vec<PhoneDevice> = session.registration.devices.values().cloned().collect();
        let mode = session
            .registration
            .mode
            .unwrap_or(PhoneMode::SoftPhone);
        (devices, mode, session.user.clone())
    };
    if devices.is_empty() {
        debug!(target: "Client/Devices", "no devices reported yet");
        return;
    }

    let callbacks = client.callbacks.clone();
    let selector = DeviceSelector {
        client: client.clone(),
    };
    let offered = devices.clone();
    let handled = run_callback("devices_available", async move {
        callbacks.devices_available(offered, mode, selector).await
    })
    .await
    .unwrap_or(false);
    if handled {
        return;
    }

    let predicted = client.config.predict_device(&user);
    match pick_default(&devices, mode, &predicted) {
        Some(choice) => send_connect(client, &choice.device_name, &choice.line_dn).await,
        None => {
            session::stop_sign_in(
                client,
                SdkError::from_code("NoDevicesFound")
                    .with_detail(format!("no {mode} device available")),
            )
            .await;
        }
    }
}

/// Connects the phone to a device. Deferred while multimedia capabilities
/// are down and replayed when they start; repeated connects to the device
/// already in use are dropped.
pub(crate) async fn send_connect(client: &Arc<Client>, device_name: &str, line_dn: &str) {
    {
        let mut media = client.media.lock().await;
        if !media.multimedia_started {
            debug!(target: "Client/Devices", "deferring connect to {device_name} until multimedia starts");
            media.pending_connect = Some(PendingConnect {
                device_name: device_name.to_string(),
                line_dn: line_dn.to_string(),
            });
            return;
        }
    }
    {
        let mut session = client.session.lock().await;
        if session.last_connected_device == device_name {
            debug!(target: "Client/Devices", "already connecting to {device_name}");
            return;
        }
        session.last_connected_device = device_name.to_string();
    }

    let (mode, force) = {
        let session = client.session.lock().await;
        (
            session.registration.mode.unwrap_or(PhoneMode::SoftPhone),
            session.registration.force_registration,
        )
    };
    info!(target: "Client/Devices", "connecting to device {device_name}");
    client
        .send_command(
            "connect",
            Some(json!({
                "phoneMode": mode.to_string(),
                "deviceName": device_name,
                "lineDN": line_dn,
                "forceRegistration": force,
            })),
        )
        .await;
}

impl Client {
    /// Switches between softphone and deskphone mode. An unknown or missing
    /// device name falls back to the first device of the target mode, with
    /// the line choice cleared.
    pub async fn switch_phone_mode(
        self: &Arc<Self>,
        mode: PhoneMode,
        device_name: Option<&str>,
    ) -> Result<(), SdkError> {
        let state = self.engine.lock().await.connection_status.clone();
        let devices = session::refresh_registration(self, &state).await;
        let candidates: Vec<&PhoneDevice> =
            devices.iter().filter(|d| d.matches_mode(mode)).collect();

        let choice = match device_name {
            Some(name) => candidates
                .iter()
                .find(|d| d.name == name)
                .map(|d| DeviceChoice {
                    device_name: d.name.clone(),
                    line_dn: String::new(),
                })
                .or_else(|| {
                    candidates.first().map(|d| DeviceChoice {
                        device_name: d.name.clone(),
                        line_dn: String::new(),
                    })
                }),
            None => {
                let predicted = {
                    let session = self.session.lock().await;
                    self.config.predict_device(&session.user)
                };
                pick_default(&devices, mode, &predicted)
            }
        };
        let Some(choice) = choice else {
            return Err(SdkError::from_code("NoDevicesFound")
                .with_detail(format!("no {mode} device available")));
        };

        {
            let mut session = self.session.lock().await;
            session.switching_mode = true;
            session.registration.mode = Some(mode);
            session.registration.line = None;
        }
        send_connect(self, &choice.device_name, &choice.line_dn).await;
        Ok(())
    }
}
