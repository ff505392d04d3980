//! In-process message bus
//!
//! One bounded inbox per agent id. Publishing awaits free space in the
//! receiver's inbox, so a lagging agent slows its peers down instead of
//! growing memory. Messages from one publisher to one receiver arrive in
//! publish order; nothing is persisted or retried here.
//!
//! An observed bus also copies every message to an observer tap. Messages
//! addressed to the observer id are delivered only through the tap.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, trace};
use tokio::sync::mpsc;

use crate::domain::Message;
use crate::error::{Result, TandemError};

/// Default inbox capacity per agent
pub const DEFAULT_CAPACITY: usize = 64;

/// Inbound channel handed to a subscriber
pub type Inbox = mpsc::Receiver<Message>;

struct Observer {
    id: String,
    tx: mpsc::Sender<Message>,
}

/// Publish/subscribe broker keyed by agent id
pub struct MessageBus {
    capacity: usize,
    inboxes: Mutex<HashMap<String, mpsc::Sender<Message>>>,
    observer: Mutex<Option<Observer>>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl MessageBus {
    /// Create a bus without an observer
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inboxes: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
        }
    }

    /// Create a bus whose traffic is copied to `observer_id`'s tap
    pub fn observed(capacity: usize, observer_id: impl Into<String>) -> (Self, Inbox) {
        let bus = Self::new(capacity);
        let (tx, rx) = mpsc::channel(bus.capacity);
        if let Ok(mut observer) = bus.observer.lock() {
            *observer = Some(Observer {
                id: observer_id.into(),
                tx,
            });
        }
        (bus, rx)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register the single consumer for `agent_id`
    pub fn subscribe(&self, agent_id: &str) -> Result<Inbox> {
        let mut inboxes = self.inboxes.lock().map_err(|e| TandemError::Bus(e.to_string()))?;
        if inboxes.contains_key(agent_id) {
            return Err(TandemError::Bus(format!("{} already has a subscriber", agent_id)));
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        inboxes.insert(agent_id.to_string(), tx);
        debug!("Bus: {} subscribed", agent_id);
        Ok(rx)
    }

    pub fn is_subscribed(&self, agent_id: &str) -> bool {
        self.inboxes
            .lock()
            .map(|inboxes| inboxes.contains_key(agent_id))
            .unwrap_or(false)
    }

    /// Deliver a message, waiting while the receiver's inbox is full
    pub async fn publish(&self, message: Message) -> Result<()> {
        trace!(
            "Bus: {} {} -> {}",
            message.message_type(),
            message.from_agent,
            message.to_agent
        );

        let (observer_tx, addressed_to_observer) = {
            let observer = self.observer.lock().map_err(|e| TandemError::Bus(e.to_string()))?;
            match observer.as_ref() {
                Some(o) => (Some(o.tx.clone()), o.id == message.to_agent),
                None => (None, false),
            }
        };

        if addressed_to_observer {
            if let Some(tx) = observer_tx {
                return tx
                    .send(message)
                    .await
                    .map_err(|_| TandemError::Bus("observer is gone".to_string()));
            }
        }

        let target = {
            let inboxes = self.inboxes.lock().map_err(|e| TandemError::Bus(e.to_string()))?;
            inboxes.get(&message.to_agent).cloned()
        };
        let target = target.ok_or_else(|| TandemError::Bus(format!("no subscriber for {}", message.to_agent)))?;

        // The tap sees a message before its receiver does
        if let Some(tx) = observer_tx {
            tx.send(message.clone())
                .await
                .map_err(|_| TandemError::Bus("observer is gone".to_string()))?;
        }

        let to = message.to_agent.clone();
        target
            .send(message)
            .await
            .map_err(|_| TandemError::Bus(format!("{} inbox is closed", to)))
    }

    /// Drop every inbox and the tap so consumers see end-of-stream
    pub fn close(&self) {
        if let Ok(mut inboxes) = self.inboxes.lock() {
            inboxes.clear();
        }
        if let Ok(mut observer) = self.observer.lock() {
            *observer = None;
        }
        debug!("Bus: closed");
    }
}
