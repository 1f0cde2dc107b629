use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of telephony device a registration drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhoneMode {
    SoftPhone,
    DeskPhone,
}

impl fmt::Display for PhoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhoneMode::SoftPhone => f.write_str("SoftPhone"),
            PhoneMode::DeskPhone => f.write_str("DeskPhone"),
        }
    }
}

/// One entry of the engine's telephony device list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhoneDevice {
    pub name: String,
    pub description: Option<String>,
    pub model_description: String,
    pub is_soft_phone: bool,
    pub is_desk_phone: bool,
    #[serde(rename = "lineDNs")]
    pub line_dns: Vec<String>,
    pub service_state: Option<String>,
}

impl PhoneDevice {
    pub fn matches_mode(&self, mode: PhoneMode) -> bool {
        match mode {
            PhoneMode::SoftPhone => self.is_soft_phone,
            PhoneMode::DeskPhone => self.is_desk_phone,
        }
    }
}

/// The device/line choice an application (or the default picker) settles on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceChoice {
    pub device_name: String,
    pub line_dn: String,
}
