//! Session bus: named publish/subscribe transport.
//!
//! One logical channel per live session. Publishing is fire-and-forget and
//! never blocks; delivery is asynchronous and best-effort to every *other*
//! subscriber of the channel. Receivers hold a [`Subscription`] for as long as
//! their surface is mounted and drain it from their own event loop.
//!
//! Backends:
//! - [`InProcessBus`]: surfaces sharing one process.
//! - [`RelayBus`] (native): separate processes, through the loopback relay.
//! - [`BroadcastChannelBus`] (wasm): browsing contexts of one origin.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod relay;

#[cfg(target_arch = "wasm32")]
mod broadcast;

pub use memory::{InProcessBus, InProcessEndpoint};

#[cfg(not(target_arch = "wasm32"))]
pub use relay::{RelayBus, RelayClientFrame, RelayServerFrame};

#[cfg(target_arch = "wasm32")]
pub use broadcast::BroadcastChannelBus;

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::BusMessage;

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Invalid bus address: {0}")]
    InvalidAddress(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Bus is closed")]
    Closed,
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Identifier scoping one live session's channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of one bus endpoint, stamped on every publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame carried by inter-process backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub from: PeerId,
    pub payload: serde_json::Value,
}

/// A publish/subscribe transport.
pub trait SessionBus {
    /// Identity of this endpoint.
    fn peer_id(&self) -> PeerId;

    /// Publish to every other subscriber of `channel`. Never blocks, never fails.
    fn publish(&self, channel: &ChannelId, message: &BusMessage);

    /// Start receiving `channel`. Dropping the subscription unsubscribes.
    fn subscribe(&self, channel: &ChannelId) -> BusResult<Subscription>;
}

/// Persistent receive handle, owned by one mounted surface.
pub struct Subscription {
    channel: ChannelId,
    rx: Receiver<BusMessage>,
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Create a subscription; `release` runs once on unsubscribe or drop.
    pub fn new(channel: ChannelId, rx: Receiver<BusMessage>, release: impl FnOnce() + 'static) -> Self {
        Self {
            channel,
            rx,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Take every message delivered so far (non-blocking).
    pub fn drain(&self) -> Vec<BusMessage> {
        self.rx.try_iter().collect()
    }

    /// Stop receiving.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            log::debug!("Unsubscribing from channel {}", self.channel);
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// A bus bound to one session channel.
///
/// Publishing goes through the bus each call; there is no long-lived sender.
#[derive(Clone)]
pub struct SessionChannel {
    bus: Rc<dyn SessionBus>,
    id: ChannelId,
}

impl SessionChannel {
    pub fn new(bus: Rc<dyn SessionBus>, id: ChannelId) -> Self {
        Self { bus, id }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn publish(&self, message: BusMessage) {
        log::trace!("[{}] publish {}", self.id, message.kind());
        self.bus.publish(&self.id, &message);
    }

    pub fn subscribe(&self) -> BusResult<Subscription> {
        self.bus.subscribe(&self.id)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Bus double that records publications and lets tests inject deliveries.

    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc::{self, Sender};

    #[derive(Default)]
    pub struct RecordingBus {
        pub published: RefCell<Vec<BusMessage>>,
        inbox: RefCell<Vec<Sender<BusMessage>>>,
        peer: Option<PeerId>,
    }

    impl RecordingBus {
        pub fn new() -> Rc<Self> {
            Rc::new(Self {
                peer: Some(PeerId::new_random()),
                ..Self::default()
            })
        }

        /// Deliver a message to every live subscription.
        pub fn deliver(&self, message: BusMessage) {
            self.inbox
                .borrow_mut()
                .retain(|tx| tx.send(message.clone()).is_ok());
        }

        pub fn take(&self) -> Vec<BusMessage> {
            std::mem::take(&mut *self.published.borrow_mut())
        }

        pub fn subscriber_count(&self) -> usize {
            self.inbox.borrow().len()
        }
    }

    impl SessionBus for RecordingBus {
        fn peer_id(&self) -> PeerId {
            self.peer.unwrap_or_else(PeerId::new_random)
        }

        fn publish(&self, _channel: &ChannelId, message: &BusMessage) {
            self.published.borrow_mut().push(message.clone());
        }

        fn subscribe(&self, channel: &ChannelId) -> BusResult<Subscription> {
            let (tx, rx) = mpsc::channel::<BusMessage>();
            self.inbox.borrow_mut().push(tx);
            Ok(Subscription::new(channel.clone(), rx, || {}))
        }
    }

    pub fn session(bus: &Rc<RecordingBus>) -> SessionChannel {
        SessionChannel::new(bus.clone(), ChannelId::new("s42"))
    }
}
