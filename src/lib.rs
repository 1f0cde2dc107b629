pub mod calls;
pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod request;
pub mod signin;
pub mod store;
pub mod types;

// The flat surface applications actually use.
pub use calls::control::ConversationUpdate;
pub use channel::{ChannelError, ChannelSink};
pub use client::Client;
pub use config::ClientConfig;
pub use errors::SdkError;
pub use signin::manual::{CucmInput, CucmServers, ManualSignIn};
pub use signin::session::{Passphrase, Registration};
pub use signin::{
    CertificateResponder, CredentialsPrompt, DeviceSelector, EmailPrompt, NoCallbacks,
    SessionCallbacks,
};
pub use store::{CacheStore, FileStore, MemoryStore};
pub use types::{CallId, Conversation, ConversationState, PhoneDevice, PhoneMode};
