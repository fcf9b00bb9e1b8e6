//! Fan-out of chat events to every connected client.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "send message")]
    SendMessage(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receive message")]
    ReceiveMessage(serde_json::Value),
    #[serde(rename = "error")]
    Error(String),
}

#[derive(Default)]
pub struct Hub {
    clients: DashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.clients.insert(id, tx);
        (id, rx)
    }

    pub fn leave(&self, id: Uuid) {
        self.clients.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn send_to(&self, id: Uuid, event: ServerEvent) {
        if let Some(tx) = self.clients.get(&id) {
            let _ = tx.send(event);
        }
    }

    /// Deliver `event` to everyone except `from`. Clients whose channel has
    /// closed are dropped. Returns how many clients received it.
    pub fn broadcast_from(&self, from: Uuid, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();
        for entry in self.clients.iter() {
            if *entry.key() == from {
                continue;
            }
            if entry.value().send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                gone.push(*entry.key());
            }
        }
        for id in gone {
            self.clients.remove(&id);
        }
        delivered
    }
}
