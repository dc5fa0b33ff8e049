//! Event gateway
//!
//! The core never talks to a socket directly: it addresses a single
//! connection by id or a whole room by code through this trait. The
//! production implementation fans out over per-connection channels owned by
//! the WebSocket tasks; tests swap in a recorder.

use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, RoomCode};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

#[async_trait]
pub trait EventGateway: Send + Sync {
    /// Associate a connection with a room code so room broadcasts reach it
    async fn join_room(&self, conn_id: &ConnectionId, room_code: &str);
    /// Drop a connection's room association
    async fn leave_room(&self, conn_id: &ConnectionId);
    /// Deliver to a single connection
    async fn send_to(&self, conn_id: &ConnectionId, message: ServerMessage);
    /// Deliver to every connection currently grouped under the room code
    async fn broadcast(&self, room_code: &str, message: ServerMessage);
}

/// Gateway backed by the per-connection outbound channels of the WebSocket
/// layer. Send failures mean the connection task already exited; they are
/// ignored, the disconnect path cleans up.
#[derive(Default)]
pub struct WsGateway {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>,
    membership: RwLock<HashMap<ConnectionId, RoomCode>>,
}

impl WsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the connection task once the socket is up
    pub async fn register(
        &self,
        conn_id: &ConnectionId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        self.senders.write().await.insert(conn_id.clone(), sender);
    }

    /// Called by the connection task on its way out
    pub async fn unregister(&self, conn_id: &ConnectionId) {
        self.senders.write().await.remove(conn_id);
        self.membership.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

#[async_trait]
impl EventGateway for WsGateway {
    async fn join_room(&self, conn_id: &ConnectionId, room_code: &str) {
        self.membership
            .write()
            .await
            .insert(conn_id.clone(), room_code.to_string());
    }

    async fn leave_room(&self, conn_id: &ConnectionId) {
        self.membership.write().await.remove(conn_id);
    }

    async fn send_to(&self, conn_id: &ConnectionId, message: ServerMessage) {
        if let Some(tx) = self.senders.read().await.get(conn_id) {
            let _ = tx.send(message);
        }
    }

    async fn broadcast(&self, room_code: &str, message: ServerMessage) {
        let membership = self.membership.read().await;
        let senders = self.senders.read().await;
        for (conn_id, code) in membership.iter() {
            if code == room_code {
                if let Some(tx) = senders.get(conn_id) {
                    let _ = tx.send(message.clone());
                }
            }
        }
    }
}

/// Addressee of a recorded outbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Connection(ConnectionId),
    Room(RoomCode),
}

/// Test double that records every outbound event instead of delivering it
#[derive(Default)]
pub struct RecordingGateway {
    events: std::sync::Mutex<Vec<(Target, ServerMessage)>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Target, ServerMessage)> {
        self.events.lock().unwrap().clone()
    }

    /// Drain recorded events, leaving the recorder empty
    pub fn take(&self) -> Vec<(Target, ServerMessage)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Messages broadcast to the given room, in order
    pub fn broadcasts_to(&self, room_code: &str) -> Vec<ServerMessage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == Target::Room(room_code.to_string()))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Messages sent to a single connection, in order
    pub fn sent_to(&self, conn_id: &str) -> Vec<ServerMessage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == Target::Connection(conn_id.to_string()))
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

#[async_trait]
impl EventGateway for RecordingGateway {
    async fn join_room(&self, _conn_id: &ConnectionId, _room_code: &str) {}

    async fn leave_room(&self, _conn_id: &ConnectionId) {}

    async fn send_to(&self, conn_id: &ConnectionId, message: ServerMessage) {
        self.events
            .lock()
            .unwrap()
            .push((Target::Connection(conn_id.clone()), message));
    }

    async fn broadcast(&self, room_code: &str, message: ServerMessage) {
        self.events
            .lock()
            .unwrap()
            .push((Target::Room(room_code.to_string()), message));
    }
}
