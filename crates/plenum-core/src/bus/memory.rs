//! In-process bus for surfaces sharing one process.

use super::{BusError, BusResult, ChannelId, PeerId, SessionBus, Subscription};
use crate::protocol::BusMessage;
use std::collections::HashMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, Weak};

struct Subscriber {
    id: u64,
    peer: PeerId,
    tx: Sender<BusMessage>,
}

#[derive(Default)]
struct Hub {
    next_id: u64,
    channels: HashMap<ChannelId, Vec<Subscriber>>,
}

/// Shared hub. Each surface talks through its own [`InProcessEndpoint`].
#[derive(Clone, Default)]
pub struct InProcessBus {
    hub: Arc<Mutex<Hub>>,
}

impl InProcessBus {
    /// Create a new empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint with a fresh peer identity.
    pub fn endpoint(&self) -> InProcessEndpoint {
        InProcessEndpoint {
            hub: self.hub.clone(),
            peer: PeerId::new_random(),
        }
    }

    /// Number of live subscriptions on a channel.
    pub fn subscriber_count(&self, channel: &ChannelId) -> usize {
        self.hub
            .lock()
            .map(|hub| hub.channels.get(channel).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// One surface's view of an [`InProcessBus`].
pub struct InProcessEndpoint {
    hub: Arc<Mutex<Hub>>,
    peer: PeerId,
}

impl SessionBus for InProcessEndpoint {
    fn peer_id(&self) -> PeerId {
        self.peer
    }

    fn publish(&self, channel: &ChannelId, message: &BusMessage) {
        let mut hub = match self.hub.lock() {
            Ok(hub) => hub,
            Err(e) => {
                log::warn!("In-process bus lock poisoned, dropping {}: {}", message.kind(), e);
                return;
            }
        };
        if let Some(subscribers) = hub.channels.get_mut(channel) {
            // Receivers whose subscription is gone are pruned on the way.
            subscribers.retain(|sub| sub.peer == self.peer || sub.tx.send(message.clone()).is_ok());
        }
    }

    fn subscribe(&self, channel: &ChannelId) -> BusResult<Subscription> {
        let (tx, rx) = mpsc::channel::<BusMessage>();
        let id = {
            let mut hub = self.hub.lock().map_err(|_| BusError::Closed)?;
            let id = hub.next_id;
            hub.next_id += 1;
            hub.channels.entry(channel.clone()).or_default().push(Subscriber {
                id,
                peer: self.peer,
                tx,
            });
            id
        };

        let hub: Weak<Mutex<Hub>> = Arc::downgrade(&self.hub);
        let key = channel.clone();
        Ok(Subscription::new(channel.clone(), rx, move || {
            let Some(hub) = hub.upgrade() else { return };
            if let Ok(mut hub) = hub.lock() {
                if let Some(subscribers) = hub.channels.get_mut(&key) {
                    subscribers.retain(|sub| sub.id != id);
                    if subscribers.is_empty() {
                        hub.channels.remove(&key);
                    }
                }
            }
        }))
    }
}
