pub mod call;
pub mod device;
pub mod events;

pub use call::{CallId, Capabilities, Conversation, ConversationState, Participant};
pub use device::{DeviceChoice, PhoneDevice, PhoneMode};
