use crate::client::Client;
use crate::types::{Conversation, ConversationState};
use chrono::Utc;
use log::debug;
use serde_json::Value;
use std::sync::Arc;

enum Outcome {
    Discard,
    Incoming(Conversation),
    Started(Conversation),
    Updated(Conversation),
    Ended(Conversation),
}

/// Feeds one raw engine call snapshot through reconciliation. Malformed
/// snapshots are dropped so one broken call cannot poison the stream.
pub(crate) async fn process_snapshot_value(client: &Arc<Client>, value: Value) {
    match serde_json::from_value::<Conversation>(value) {
        Ok(snapshot) => process_snapshot(client, snapshot).await,
        Err(e) => debug!(target: "Client/Calls", "dropping malformed call snapshot: {e}"),
    }
}

/// The reconciliation engine: maps the engine's stateless snapshot stream
/// onto an ordered incoming/started/updated/ended event stream per call.
pub(crate) async fn process_snapshot(client: &Arc<Client>, mut snapshot: Conversation) {
    if snapshot.id.0.is_empty() {
        debug!(target: "Client/Calls", "dropping call snapshot without an id");
        return;
    }

    // Normalize the first remote participant into a dialable address.
    snapshot.participant = snapshot.participants.first().map(|p| {
        let mut p = p.clone();
        p.recipient = p.recipient_address();
        p
    });

    // Transfer lock before the call table, always.
    if client.transfer.lock().await.in_progress {
        snapshot.capabilities.can_direct_transfer = false;
    }

    let outcome = {
        let mut calls = client.calls.lock().await;
        let id = snapshot.id.clone();

        // The final Connected echo of a call we asked to end is noise.
        if calls.ending.as_ref() == Some(&id) && snapshot.state == ConversationState::Connected {
            Outcome::Discard
        } else {
            let previous_seen = calls.last_seen.insert(id.clone(), snapshot.clone());
            let is_duplicate = previous_seen.is_some_and(|prev| {
                prev.state == ConversationState::Connected
                    && snapshot.state == ConversationState::Connected
                    && snapshot.duplicate_of(&prev)
            });
            if is_duplicate {
                Outcome::Discard
            } else {
                let existing = calls.records.get(&id).cloned();
                let ends = (snapshot.state == ConversationState::OnHook
                    && !snapshot.capabilities.can_originate_call)
                    || !snapshot.exists;

                if snapshot.state == ConversationState::Ringin && existing.is_none() {
                    calls.records.insert(id, snapshot.clone());
                    Outcome::Incoming(snapshot)
                } else if ends {
                    let record = calls.records.remove(&id);
                    calls.last_seen.remove(&id);
                    if calls.ending.as_ref() == Some(&id) {
                        calls.ending = None;
                    }
                    match record {
                        Some(record) => Outcome::Ended(snapshot.merged_over(&record)),
                        // The engine can end a call we never surfaced.
                        None => Outcome::Ended(snapshot),
                    }
                } else {
                    let mut merged = match &existing {
                        Some(record) => snapshot.merged_over(record),
                        None => snapshot,
                    };
                    if merged.state == ConversationState::Connected && merged.connect.is_none() {
                        merged.connect = Some(Utc::now());
                    }
                    // Start fires once, when the call goes off-hook or
                    // connects. A call first seen mid-flight (mode switch,
                    // seeded call list) also surfaces as a start.
                    let active = matches!(
                        merged.state,
                        ConversationState::OffHook | ConversationState::Connected
                    );
                    let started = merged.start.is_none()
                        && (active || (existing.is_none() && merged.exists));
                    if started && active {
                        merged.start = Some(Utc::now());
                    }
                    calls.records.insert(id, merged.clone());
                    if started {
                        Outcome::Started(merged)
                    } else {
                        Outcome::Updated(merged)
                    }
                }
            }
        }
    };

    match outcome {
        Outcome::Discard => {}
        Outcome::Incoming(c) => {
            client
                .event_bus
                .conversation_incoming
                .send(Arc::new(c))
                .ok();
        }
        Outcome::Started(c) => {
            client.event_bus.conversation_started.send(Arc::new(c)).ok();
        }
        Outcome::Updated(c) => {
            client.event_bus.conversation_updated.send(Arc::new(c)).ok();
        }
        Outcome::Ended(c) => {
            super::video::release_on_end(client, &c.id).await;
            client.event_bus.conversation_ended.send(Arc::new(c)).ok();
        }
    }
}
