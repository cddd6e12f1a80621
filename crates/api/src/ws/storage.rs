use std::collections::HashMap;
use std::sync::Arc;

use bson::oid::ObjectId;
use parking_lot::RwLock;
use serde::Serialize;
use studyroom_services::Identity;
use tokio::sync::{Notify, mpsc, mpsc::error::TrySendError};
use tracing::{debug, info, warn};

use super::protocol::ServerEvent;

/// Outbound half of a connection. Frames queued here are written to the
/// socket by the connection's writer task; `close` asks the connection's
/// read loop to shut the socket down.
#[derive(Clone)]
pub struct WsSender {
    frames: mpsc::Sender<String>,
    close: Arc<Notify>,
}

impl WsSender {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (frames, rx) = mpsc::channel(capacity);
        let sender = Self {
            frames,
            close: Arc::new(Notify::new()),
        };
        (sender, rx)
    }

    /// Queues a frame without waiting. A peer that lets its queue fill up is
    /// not keeping up with the room and gets disconnected.
    pub fn queue(&self, text: String) -> bool {
        match self.frames.try_send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.close();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn close(&self) {
        self.close.notify_one();
    }

    /// Resolves once `close` has been called, including before this call.
    pub async fn closed(&self) {
        self.close.notified().await;
    }
}

struct PresenceEntry {
    connection_id: String,
    identity: Identity,
    sender: WsSender,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnlineUser {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceSnapshot {
    pub count: usize,
    pub users: Vec<OnlineUser>,
}

/// Connected identities, one live connection each (the newest wins).
///
/// Every mutation and the presence broadcast it triggers happen under the
/// same write lock, so each snapshot peers see matches a state the registry
/// was actually in.
#[derive(Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<ObjectId, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the connection, replacing any earlier one for the same
    /// identity, and pushes the new snapshot to everyone.
    pub fn connect(&self, identity: Identity, connection_id: String, sender: WsSender) {
        let mut entries = self.entries.write();
        let user_id = identity.id;
        if let Some(previous) = entries.insert(
            user_id,
            PresenceEntry {
                connection_id,
                identity,
                sender,
            },
        ) {
            info!(?user_id, old_connection = %previous.connection_id, "Presence entry replaced by newer connection");
            previous.sender.close();
        }
        let update = ServerEvent::OnlineUsersUpdate(snapshot_of(&entries));
        fan_out(&entries, &update, None);
    }

    /// Drops the entry if it still belongs to `connection_id` and pushes the
    /// new snapshot. A connection that was already superseded changes nothing.
    pub fn disconnect(&self, user_id: &ObjectId, connection_id: &str) -> bool {
        let mut entries = self.entries.write();
        let owned = entries
            .get(user_id)
            .is_some_and(|e| e.connection_id == connection_id);
        if !owned {
            debug!(?user_id, %connection_id, "Superseded connection closed, presence unchanged");
            return false;
        }
        entries.remove(user_id);
        let update = ServerEvent::OnlineUsersUpdate(snapshot_of(&entries));
        fan_out(&entries, &update, None);
        true
    }

    /// Sends `event` to every connection except the one owned by `except`.
    pub fn broadcast(&self, event: &ServerEvent, except: Option<&ObjectId>) {
        let entries = self.entries.read();
        fan_out(&entries, event, except);
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        snapshot_of(&self.entries.read())
    }

    pub fn is_online(&self, user_id: &ObjectId) -> bool {
        self.entries.read().contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.entries.read().len()
    }
}

fn snapshot_of(entries: &HashMap<ObjectId, PresenceEntry>) -> PresenceSnapshot {
    let mut users: Vec<OnlineUser> = entries
        .values()
        .map(|e| OnlineUser {
            id: e.identity.id.to_hex(),
            name: e.identity.name.clone(),
            role: e.identity.role.as_str().to_string(),
        })
        .collect();
    users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    PresenceSnapshot {
        count: users.len(),
        users,
    }
}

fn fan_out(
    entries: &HashMap<ObjectId, PresenceEntry>,
    event: &ServerEvent,
    except: Option<&ObjectId>,
) {
    let text = event.to_text();
    for (user_id, entry) in entries {
        if except == Some(user_id) {
            continue;
        }
        if !entry.sender.queue(text.clone()) {
            warn!(?user_id, connection_id = %entry.connection_id, "Failed to queue WS message");
        }
    }
}
