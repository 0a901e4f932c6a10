//! `BroadcastChannel` bus for browsing contexts of one origin.

use super::{BusError, BusResult, ChannelId, Envelope, PeerId, SessionBus, Subscription};
use crate::protocol::BusMessage;
use std::sync::mpsc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{BroadcastChannel, MessageEvent};

/// Bus endpoint backed by the browser's `BroadcastChannel`.
///
/// A fresh channel object is opened for every publication and closed right
/// after, so the publishing context's own subscription sees the message too;
/// the envelope's sender id filters it out.
pub struct BroadcastChannelBus {
    peer: PeerId,
}

impl BroadcastChannelBus {
    pub fn new() -> Self {
        Self {
            peer: PeerId::new_random(),
        }
    }
}

impl Default for BroadcastChannelBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBus for BroadcastChannelBus {
    fn peer_id(&self) -> PeerId {
        self.peer
    }

    fn publish(&self, channel: &ChannelId, message: &BusMessage) {
        let Some(payload) = message.to_value() else {
            return;
        };
        let envelope = Envelope {
            from: self.peer,
            payload,
        };
        let Ok(json) = serde_json::to_string(&envelope) else {
            return;
        };

        match BroadcastChannel::new(channel.as_str()) {
            Ok(bc) => {
                if let Err(e) = bc.post_message(&JsValue::from_str(&json)) {
                    log::warn!("postMessage failed for {}: {:?}", message.kind(), e);
                }
                bc.close();
            }
            Err(e) => log::warn!("BroadcastChannel unavailable: {:?}", e),
        }
    }

    fn subscribe(&self, channel: &ChannelId) -> BusResult<Subscription> {
        let bc = BroadcastChannel::new(channel.as_str())
            .map_err(|e| BusError::Connection(format!("BroadcastChannel: {:?}", e)))?;

        let (tx, rx) = mpsc::channel::<BusMessage>();
        let own = self.peer;
        let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
            let Some(text) = e.data().as_string() else {
                return;
            };
            let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
                log::debug!("Ignoring foreign BroadcastChannel frame");
                return;
            };
            if envelope.from == own {
                return;
            }
            if let Some(msg) = BusMessage::from_value(envelope.payload) {
                let _ = tx.send(msg);
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        bc.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        Ok(Subscription::new(channel.clone(), rx, move || {
            bc.set_onmessage(None);
            bc.close();
            drop(on_message);
        }))
    }
}
