use std::sync::Arc;

use studyroom_config::Settings;
use studyroom_services::dao::MessageStore;
use studyroom_services::{ChatService, Clock, IdentityLookup};

use crate::ws::dispatcher::Broadcaster;
use crate::ws::storage::PresenceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub chat: Arc<ChatService>,
    pub identity: Arc<dyn IdentityLookup>,
    pub presence: Arc<PresenceRegistry>,
}

impl AppState {
    /// Wires the chat service to the realtime layer: every successful
    /// mutation is published through the presence registry.
    pub fn new(
        settings: Settings,
        store: Arc<dyn MessageStore>,
        identity: Arc<dyn IdentityLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let presence = Arc::new(PresenceRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(presence.clone()));
        let chat = Arc::new(ChatService::new(
            store,
            broadcaster,
            clock,
            settings.chat.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            chat,
            identity,
            presence,
        }
    }
}
