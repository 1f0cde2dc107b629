mod common;

use async_trait::async_trait;
use common::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use webphone::store::CACHED_EMAIL_KEY;
use webphone::CacheStore;
use webphone::{
    ClientConfig, CucmInput, EmailPrompt, ManualSignIn, MemoryStore, NoCallbacks, Passphrase,
    PhoneMode, SessionCallbacks,
};

fn manual_args(passphrase: Passphrase) -> ManualSignIn {
    ManualSignIn {
        user: "jdoe".into(),
        passphrase,
        cucm: CucmInput::Address("lab call manager 10.0.0.5".into()),
        mode: Some(PhoneMode::SoftPhone),
        force_registration: false,
    }
}

/// Drives the shared front half of a manual attempt: password encryption,
/// the address-list properties and the connection-status probe.
async fn serve_manual_setup(
    client: &Arc<webphone::Client>,
    channel: &Arc<FakeChannel>,
    expect_encrypt: bool,
) {
    if expect_encrypt {
        let (id, content) = channel.take_request("encryptCucmPassword").await;
        assert_eq!(content["password"], "secret");
        reply(client, &id, json!({"password": "ENC"})).await;
    }

    let mut names = Vec::new();
    for _ in 0..3 {
        let (id, content) = channel.take_request("setProperty").await;
        names.push(content["name"].as_str().unwrap().to_string());
        assert_eq!(content["value"], json!(["10.0.0.5"]));
        reply(client, &id, json!({})).await;
    }
    names.sort();
    assert_eq!(
        names,
        ["CcmcipAddressList", "CtiAddressList", "TftpAddressList"]
    );

    let (id, content) = channel.take_request("getProperty").await;
    assert_eq!(content.as_str(), Some("connectionStatus"));
    reply(client, &id, json!({"connectionStatus": "eIdle"})).await;
}

#[tokio::test]
async fn manual_sign_in_reaches_ready() {
    let (client, channel) = default_client().await;

    let register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Plain("secret".into())))
                .await
        })
    };

    serve_manual_setup(&client, &channel, true).await;

    let (id, content) = channel.take_request("startSignIn").await;
    assert_eq!(content["manualSettings"], true);
    reply(&client, &id, json!({})).await;

    let ready = push_event(&client, "connectionstatuschange", json!({"status": "eReady"}));
    serve_ready_queries(&client, &channel, json!([]), "SoftPhone").await;
    ready.await.unwrap();

    let registration = register.await.unwrap().unwrap();
    assert_eq!(registration.user.as_deref(), Some("jdoe"));
    assert_eq!(registration.mode, Some(PhoneMode::SoftPhone));
    assert_eq!(registration.cucm, vec!["10.0.0.5"]);
    assert_eq!(
        registration.password,
        Some(Passphrase::Encrypted("ENC".into()))
    );
}

#[tokio::test]
async fn manual_sign_in_redrives_credentials_after_rejection() {
    let (client, channel) = default_client().await;

    let register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Plain("secret".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, true).await;
    let (id, _) = channel.take_request("startSignIn").await;
    reply(&client, &id, json!({})).await;

    // First credentials prompt auto-submits the stored pair.
    let prompt = push_event(
        &client,
        "userprofilecredentialsrequired",
        json!({"authenticatorId": 3}),
    );
    let (id, content) = channel.take_request("setUserProfileCredentials").await;
    assert_eq!(content["username"], "jdoe");
    assert_eq!(content["password"], "ENC");
    assert_eq!(content["authenticator"], 3);
    reply(&client, &id, json!({})).await;
    prompt.await.unwrap();

    // A second prompt means the pair was rejected; the attempt fails.
    push_event(
        &client,
        "userprofilecredentialsrequired",
        json!({"authenticatorId": 3, "errors": ["InvalidCredential"]}),
    )
    .await
    .unwrap();
    let err = register.await.unwrap().unwrap_err();
    assert_eq!(err.code, "AuthenticationFailure");

    // The next attempt re-drives the waiting prompt instead of restarting
    // the engine lifecycle.
    let register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Encrypted("ENC".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, false).await;

    let (id, content) = channel.take_request("setUserProfileCredentials").await;
    assert_eq!(content["authenticator"], 3);
    reply(&client, &id, json!({})).await;
    assert!(!channel.posted("startSignIn"));

    let ready = push_event(&client, "connectionstatuschange", json!({"status": "eReady"}));
    serve_ready_queries(&client, &channel, json!([]), "SoftPhone").await;
    ready.await.unwrap();
    assert!(register.await.unwrap().is_ok());
}

#[derive(Default)]
struct EmailCallbacks {
    seen_hint: Mutex<Option<String>>,
}

#[async_trait]
impl SessionCallbacks for EmailCallbacks {
    async fn email_required(&self, prompt: EmailPrompt, hint: String) -> bool {
        *self.seen_hint.lock().unwrap() = Some(hint.clone());
        prompt.submit(&hint).await;
        true
    }
}

#[tokio::test]
async fn discovery_prompts_with_cached_email() {
    let store = Arc::new(MemoryStore::new());
    store.set(CACHED_EMAIL_KEY, "jdoe@example.com").await;
    let callbacks = Arc::new(EmailCallbacks::default());
    let (client, channel) =
        connected_client(ClientConfig::default(), callbacks.clone(), store).await;

    let _discover = {
        let client = client.clone();
        tokio::spawn(async move { client.start_discovery(None, None).await })
    };
    let (id, content) = channel.take_request("startSignIn").await;
    assert_eq!(content["manualSettings"], false);
    reply(&client, &id, json!({})).await;

    let prompt = push_event(&client, "userprofileemailaddressrequired", json!({}));
    let (id, content) = channel.take_request("setUserProfileEmailAddress").await;
    assert_eq!(content["email"], "jdoe@example.com");
    reply(&client, &id, json!({})).await;
    prompt.await.unwrap();

    assert_eq!(
        callbacks.seen_hint.lock().unwrap().as_deref(),
        Some("jdoe@example.com")
    );
}

#[tokio::test]
async fn manual_prompt_answers_with_placeholder_email() {
    let store = Arc::new(MemoryStore::new());
    let (client, channel) =
        connected_client(ClientConfig::default(), Arc::new(NoCallbacks), store.clone()).await;

    let _register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Encrypted("ENC".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, false).await;
    let (id, _) = channel.take_request("startSignIn").await;
    reply(&client, &id, json!({})).await;

    let prompt = push_event(&client, "userprofileemailaddressrequired", json!({}));
    let (id, content) = channel.take_request("setUserProfileEmailAddress").await;
    assert_eq!(content["email"], "jabbersdk@any.domain");
    reply(&client, &id, json!({})).await;
    prompt.await.unwrap();

    // The placeholder never lands in the cache.
    assert_eq!(store.get(CACHED_EMAIL_KEY).await, None);
}

#[tokio::test]
async fn second_email_prompt_fails_the_discovery_attempt() {
    let store = Arc::new(MemoryStore::new());
    store.set(CACHED_EMAIL_KEY, "jdoe@example.com").await;
    let callbacks = Arc::new(EmailCallbacks::default());
    let (client, channel) = connected_client(ClientConfig::default(), callbacks, store).await;

    let discover = {
        let client = client.clone();
        tokio::spawn(async move { client.start_discovery(None, None).await })
    };
    let (id, _) = channel.take_request("startSignIn").await;
    reply(&client, &id, json!({})).await;

    let prompt = push_event(&client, "userprofileemailaddressrequired", json!({}));
    let (id, _) = channel.take_request("setUserProfileEmailAddress").await;
    reply(&client, &id, json!({})).await;
    prompt.await.unwrap();

    // The engine asking again means the address was rejected.
    push_event(&client, "userprofileemailaddressrequired", json!({}))
        .await
        .unwrap();
    let err = discover.await.unwrap().unwrap_err();
    assert_eq!(err.code, "AuthenticationFailure");
}

#[tokio::test]
async fn stray_prompts_after_sign_out_are_ignored() {
    let (client, channel) = default_client().await;
    let mut errors = client.event_bus.error.subscribe();

    client.sign_out().await;
    let (id, _) = channel.take_request("logout").await;
    reply(&client, &id, json!({})).await;

    // The engine keeps re-sending pending prompts for a little while.
    push_event(
        &client,
        "userprofilecredentialsrequired",
        json!({"authenticatorId": 3}),
    )
    .await
    .unwrap();
    push_event(&client, "userprofileemailaddressrequired", json!({}))
        .await
        .unwrap();
    assert!(errors.try_recv().is_err());

    // The stray prompt must not poison the next attempt, which starts the
    // engine lifecycle instead of re-answering a dead credentials prompt.
    let _register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Encrypted("ENC".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, false).await;
    channel.take_request("startSignIn").await;
}

#[tokio::test]
async fn sso_requirement_aborts_manual_sign_in_with_the_engine_cause() {
    let (client, channel) = default_client().await;

    let register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Encrypted("ENC".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, false).await;
    let (id, _) = channel.take_request("startSignIn").await;
    reply(&client, &id, json!({})).await;

    push_event(&client, "ssosigninrequired", json!({"errors": ["SSOCancelled"]}))
        .await
        .unwrap();
    let err = register.await.unwrap().unwrap_err();
    assert_eq!(err.code, "AuthenticationFailure");
    assert!(err.detail.unwrap().contains("SSOCanceled"));
}

#[tokio::test]
async fn device_selection_connects_the_default_softphone() {
    let (client, channel) = default_client().await;

    let _register = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .register_phone(manual_args(Passphrase::Encrypted("ENC".into())))
                .await
        })
    };
    serve_manual_setup(&client, &channel, false).await;
    let (id, _) = channel.take_request("startSignIn").await;
    reply(&client, &id, json!({})).await;

    // Multimedia comes up before authentication lands.
    let started = push_event(&client, "multimediacapabilitiesstarted", json!({}));
    let (id, _) = channel.take_request("getMultimediaDevices").await;
    reply(&client, &id, json!({"devices": []})).await;
    started.await.unwrap();

    push_event(&client, "loggedin", json!({})).await.unwrap();

    let changed = push_event(&client, "telephonydeviceschange", json!({}));
    for _ in 0..2 {
        let (id, content) = channel.take_request("getProperty").await;
        match content.as_str() {
            Some("device") => reply(&client, &id, json!({"device": null})).await,
            Some("line") => reply(&client, &id, json!({"line": null})).await,
            other => panic!("unexpected getProperty {other:?}"),
        }
    }
    let (id, _) = channel.take_request("getAvailableDevices").await;
    reply(
        &client,
        &id,
        json!({"devices": [
            {
                "name": "SEP001122334455",
                "isDeskPhone": true,
                "modelDescription": "Cisco 8845",
                "lineDNs": ["1001"],
            },
            {
                "name": "ECPjdoe",
                "isSoftPhone": true,
                "modelDescription": "Cisco Unified Client Services Framework",
                "lineDNs": [],
            },
        ]}),
    )
    .await;
    changed.await.unwrap();

    let (_, content) = channel.take_request("connect").await;
    assert_eq!(content["phoneMode"], "SoftPhone");
    assert_eq!(content["deviceName"], "ECPjdoe");
    assert_eq!(content["lineDN"], "");
    assert_eq!(content["forceRegistration"], false);
}
