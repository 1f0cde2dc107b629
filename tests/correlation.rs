mod common;

use common::*;
use serde_json::json;

#[tokio::test]
async fn reply_errors_resolve_through_the_taxonomy() {
    let (client, channel) = default_client().await;

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request("getCalls", None).await })
    };
    let (id, _) = channel.take_request("getCalls").await;
    reply_error(&client, &id, "eInvalidState").await;

    let err = request.await.unwrap().unwrap_err();
    assert_eq!(err.code, "InvalidState");
    assert_eq!(err.native_error.as_deref(), Some("eInvalidState"));
}

#[tokio::test]
async fn one_message_can_resolve_and_dispatch() {
    let (client, channel) = default_client().await;
    let mut ringtones = client.event_bus.ringtone_changed.subscribe();

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request("getRingtone", None).await })
    };
    let (id, _) = channel.take_request("getRingtone").await;
    client
        .process_incoming(json!({
            "ciscoSDKServerMessage": {
                "replyToMessageId": id,
                "name": "ringtonechanged",
                "content": {"ringtone": "chirp"},
                "error": "",
            }
        }))
        .await;

    let content = request.await.unwrap().unwrap();
    assert_eq!(content["ringtone"], "chirp");
    assert_eq!(ringtones.recv().await.unwrap().ringtone, "chirp");
}

#[tokio::test]
async fn unknown_reply_ids_are_dropped() {
    let (client, _channel) = default_client().await;
    // Nothing is waiting on this id; the reply must be swallowed quietly.
    reply(&client, "12345", json!({"ignored": true})).await;
}

#[tokio::test]
async fn channel_loss_fails_pending_and_future_requests() {
    let (client, channel) = default_client().await;
    let mut errors = client.event_bus.error.subscribe();

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.send_request("getCalls", None).await })
    };
    channel.take_request("getCalls").await;

    client
        .process_incoming(json!({
            "ciscoChannelServerMessage": {"name": "ChannelDisconnect"}
        }))
        .await;

    let err = request.await.unwrap().unwrap_err();
    assert_eq!(err.code, "CannotConnectToServer");
    assert_eq!(errors.recv().await.unwrap().code, "ExtensionNotAvailable");

    let err = client.send_request("getCalls", None).await.unwrap_err();
    assert_eq!(err.code, "CannotConnectToServer");
}

#[tokio::test]
async fn host_loss_reports_the_plugin_unavailable() {
    let (client, _channel) = default_client().await;
    let mut errors = client.event_bus.error.subscribe();
    client
        .process_incoming(json!({
            "ciscoChannelServerMessage": {"name": "HostDisconnect"}
        }))
        .await;
    assert_eq!(errors.recv().await.unwrap().code, "PluginNotAvailable");
}
