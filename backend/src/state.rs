use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        BuddyService, BusChildService, ChatModel, ChatService, EmergencyService,
        LiveLocationService, LostFoundService, TourDayService,
    },
    store::DocumentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    pub live_location: LiveLocationService,
    pub tours: TourDayService,
    pub bus_children: BusChildService,
    pub buddies: BuddyService,
    pub lost_found: LostFoundService,
    pub emergencies: EmergencyService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: Config,
        chat_model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        let retention_ms = config.lost_found_retention_ms();
        Self {
            live_location: LiveLocationService::new(Arc::clone(&store)),
            tours: TourDayService::new(Arc::clone(&store)),
            bus_children: BusChildService::new(Arc::clone(&store)),
            buddies: BuddyService::new(Arc::clone(&store)),
            lost_found: LostFoundService::new(Arc::clone(&store), retention_ms),
            emergencies: EmergencyService::new(Arc::clone(&store)),
            chat: ChatService::new(chat_model),
            store,
            config,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
