//! Session transport seam
//!
//! The core never talks to sockets. Everything it says goes through
//! `send_to` (directed) or `broadcast` (everyone connected).

use crate::protocol::ServerMessage;
use crate::types::ParticipantId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Deliver to one participant. Unknown recipients are dropped silently.
    async fn send_to(&self, to: ParticipantId, msg: ServerMessage);

    /// Deliver to every connected participant
    async fn broadcast(&self, msg: ServerMessage);
}

/// In-process transport with one ordered queue per participant.
///
/// Broadcasts are fanned out into the same queues as directed messages, so
/// each participant sees a single host-issued order.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    queues: RwLock<HashMap<ParticipantId, mpsc::UnboundedSender<ServerMessage>>>,
    next_id: AtomicU64,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a participant id and its outbound queue
    pub async fn register(&self) -> (ParticipantId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ParticipantId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.queues.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unregister(&self, id: ParticipantId) {
        self.queues.write().await.remove(&id);
    }
}

#[async_trait]
impl SessionTransport for ChannelTransport {
    async fn send_to(&self, to: ParticipantId, msg: ServerMessage) {
        let queues = self.queues.read().await;
        match queues.get(&to) {
            Some(tx) => {
                // Receiver gone means the socket is closing; disconnect follows
                let _ = tx.send(msg);
            }
            None => tracing::debug!("Dropping message for unknown participant {}", to),
        }
    }

    async fn broadcast(&self, msg: ServerMessage) {
        let queues = self.queues.read().await;
        for tx in queues.values() {
            let _ = tx.send(msg.clone());
        }
    }
}

/// Where a recorded message was sent
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    To(ParticipantId),
    All,
}

/// Transport that records every delivery in issue order
#[derive(Debug, Default)]
pub struct RecordingTransport {
    log: RwLock<Vec<(Delivery, ServerMessage)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<(Delivery, ServerMessage)> {
        self.log.read().await.clone()
    }

    /// Broadcast messages only
    pub async fn broadcasts(&self) -> Vec<ServerMessage> {
        self.log
            .read()
            .await
            .iter()
            .filter(|(d, _)| *d == Delivery::All)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Messages directed at one participant
    pub async fn sent_to(&self, id: ParticipantId) -> Vec<ServerMessage> {
        self.log
            .read()
            .await
            .iter()
            .filter(|(d, _)| *d == Delivery::To(id))
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub async fn clear(&self) {
        self.log.write().await.clear();
    }
}

#[async_trait]
impl SessionTransport for RecordingTransport {
    async fn send_to(&self, to: ParticipantId, msg: ServerMessage) {
        self.log.write().await.push((Delivery::To(to), msg));
    }

    async fn broadcast(&self, msg: ServerMessage) {
        self.log.write().await.push((Delivery::All, msg));
    }
}
