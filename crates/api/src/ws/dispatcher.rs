use std::sync::Arc;

use studyroom_services::{ChatEvent, EventPublisher};
use tracing::{debug, warn};

use super::protocol::ServerEvent;
use super::storage::{PresenceRegistry, WsSender};

/// Fans chat service events out to every live connection.
pub struct Broadcaster {
    presence: Arc<PresenceRegistry>,
}

impl Broadcaster {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }
}

impl EventPublisher for Broadcaster {
    fn publish(&self, event: ChatEvent) {
        let except = event.excluded_recipient();
        let frame = ServerEvent::from(event);
        self.presence.broadcast(&frame, except.as_ref());
    }
}

/// Sends a frame to a single connection.
pub fn send_to_connection(sender: &WsSender, connection_id: &str, event: &ServerEvent) {
    if !sender.queue(event.to_text()) {
        warn!(%connection_id, "Failed to send WS message to connection");
    } else {
        debug!(%connection_id, "WS message sent");
    }
}
