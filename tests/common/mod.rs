#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webphone::{ChannelError, ChannelSink, Client, ClientConfig, MemoryStore, NoCallbacks};

/// Test double for the channel: records outbound requests and lets the
/// test play the engine by feeding replies and events back in.
#[derive(Default)]
pub struct FakeChannel {
    sent: Mutex<Vec<Value>>,
}

#[async_trait]
impl ChannelSink for FakeChannel {
    async fn post(&self, envelope: Value) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(envelope);
        Ok(())
    }
}

impl FakeChannel {
    /// Waits until a request with `name` has been posted, removes it from
    /// the record and returns its message id and content.
    pub async fn take_request(&self, name: &str) -> (String, Value) {
        for _ in 0..400 {
            {
                let mut sent = self.sent.lock().unwrap();
                let found = sent.iter().position(|v| {
                    v["ciscoSDKClientMessage"]["name"].as_str() == Some(name)
                });
                if let Some(i) = found {
                    let envelope = sent.remove(i);
                    let message = &envelope["ciscoSDKClientMessage"];
                    return (
                        message["messageId"].as_str().unwrap().to_string(),
                        message.get("content").cloned().unwrap_or(Value::Null),
                    );
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no '{name}' request was posted");
    }

    pub fn posted(&self, name: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|v| v["ciscoSDKClientMessage"]["name"].as_str() == Some(name))
    }
}

pub async fn reply(client: &Arc<Client>, id: &str, content: Value) {
    client
        .process_incoming(json!({
            "ciscoSDKServerMessage": {
                "replyToMessageId": id,
                "content": content,
                "error": "eNoError",
            }
        }))
        .await;
}

pub async fn reply_error(client: &Arc<Client>, id: &str, code: &str) {
    client
        .process_incoming(json!({
            "ciscoSDKServerMessage": {
                "replyToMessageId": id,
                "content": {},
                "error": code,
            }
        }))
        .await;
}

/// Feeds an unsolicited named event. Runs on its own task because many
/// handlers issue requests of their own that the test must then service.
pub fn push_event(client: &Arc<Client>, name: &str, content: Value) -> tokio::task::JoinHandle<()> {
    let client = client.clone();
    let name = name.to_string();
    tokio::spawn(async move {
        client
            .process_incoming(json!({
                "ciscoSDKServerMessage": {
                    "name": name,
                    "content": content,
                    "error": "",
                }
            }))
            .await;
    })
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A connected client/channel pair with the `init` handshake already done.
pub async fn connected_client(
    config: ClientConfig,
    callbacks: Arc<dyn webphone::SessionCallbacks>,
    store: Arc<dyn webphone::CacheStore>,
) -> (Arc<Client>, Arc<FakeChannel>) {
    init_logs();
    let client = Client::new(config, callbacks, store);
    let channel = Arc::new(FakeChannel::default());

    let attach = {
        let client = client.clone();
        let channel = channel.clone();
        tokio::spawn(async move { client.attach_channel(channel).await })
    };
    let (id, _) = channel.take_request("init").await;
    assert_eq!(id, "0");
    reply(
        &client,
        "0",
        json!({"version": "12.0", "userauthstatus": "UserAuthorized", "capabilities": {}}),
    )
    .await;
    attach.await.unwrap().unwrap();

    (client, channel)
}

pub async fn default_client() -> (Arc<Client>, Arc<FakeChannel>) {
    connected_client(
        ClientConfig::default(),
        Arc::new(NoCallbacks),
        Arc::new(MemoryStore::new()),
    )
    .await
}

/// Services the engine side of a `provider ready` transition: the property
/// refresh, the device list, the mode query and the call seed.
pub async fn serve_ready_queries(
    client: &Arc<Client>,
    channel: &Arc<FakeChannel>,
    devices: Value,
    mode: &str,
) {
    for _ in 0..2 {
        let (id, content) = channel.take_request("getProperty").await;
        match content.as_str() {
            Some("device") => reply(client, &id, json!({"device": null})).await,
            Some("line") => reply(client, &id, json!({"line": null})).await,
            other => panic!("unexpected getProperty {other:?}"),
        }
    }
    let (id, _) = channel.take_request("getAvailableDevices").await;
    reply(client, &id, json!({"devices": devices})).await;
    let (id, content) = channel.take_request("getProperty").await;
    assert_eq!(content.as_str(), Some("mode"));
    reply(client, &id, json!({"mode": mode})).await;
    let (id, _) = channel.take_request("getCalls").await;
    reply(client, &id, json!({"calls": []})).await;
}
