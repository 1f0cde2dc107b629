use super::traits::MessageHandler;
use crate::channel::ServerMessage;
use crate::client::Client;
use crate::signin::{CertificateResponder, run_callback};
use crate::types::events::CertificateAlert;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

fn string_field(content: &serde_json::Value, key: &str) -> Option<String> {
    content[key].as_str().map(str::to_string)
}

pub struct InvalidCertificateHandler;

#[async_trait]
impl MessageHandler for InvalidCertificateHandler {
    fn name(&self) -> &'static str {
        "invalidcertificate"
    }

    async fn handle(&self, client: Arc<Client>, message: &ServerMessage) -> bool {
        let content = &message.content;
        let alert = CertificateAlert {
            fingerprint: string_field(content, "certFingerprint").unwrap_or_default(),
            identifier_to_display: string_field(content, "identifierToDisplay"),
            subject_cn: string_field(content, "subjectCN"),
            reference_id: string_field(content, "referenceId"),
            invalid_reasons: content["invalidReasons"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            allow_user_to_accept: content["allowUserToAccept"].as_bool().unwrap_or(false),
            persist_accepted_decision: content["persistAcceptedDecision"]
                .as_bool()
                .unwrap_or(false),
            raw: content.clone(),
        };
        warn!(
            target: "Client/Certificate",
            "invalid certificate {} ({})",
            alert.fingerprint,
            alert.invalid_reasons.join(", ")
        );
        client
            .event_bus
            .invalid_certificate
            .send(Arc::new(alert))
            .ok();

        let callbacks = client.callbacks.clone();
        let info = content.clone();
        let responder = CertificateResponder {
            client: client.clone(),
        };
        let handled = run_callback("certificate_required", async move {
            callbacks.certificate_required(info, responder).await
        })
        .await
        .unwrap_or(false);
        if !handled {
            warn!(target: "Client/Certificate", "no certificate decision handler installed");
        }
        true
    }
}
