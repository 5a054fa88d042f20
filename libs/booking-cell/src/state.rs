// libs/booking-cell/src/state.rs
use std::sync::Arc;

use tracing::info;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::services::{
    BookingService, InMemoryAppointmentStore, InMemoryDirectory, SupabaseAppointmentStore,
    SupabaseDirectory,
};

#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<BookingService>,
}

impl BookingState {
    pub fn new(config: Arc<AppConfig>, booking: BookingService) -> Self {
        Self {
            config,
            booking: Arc::new(booking),
        }
    }

    /// Supabase-backed collaborators when configured, in-memory ones otherwise.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        if config.is_configured() {
            info!("Using Supabase collaborators at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(&config));
            let directory = Arc::new(SupabaseDirectory::new(Arc::clone(&supabase)));
            let store = Arc::new(SupabaseAppointmentStore::new(supabase));
            let booking = BookingService::new(&config, directory.clone(), directory, store);
            Self::new(config, booking)
        } else {
            Self::in_memory(config).0
        }
    }

    /// In-memory collaborators. The directory handle is returned so callers can seed it.
    pub fn in_memory(config: Arc<AppConfig>) -> (Self, Arc<InMemoryDirectory>) {
        info!("Using in-memory collaborators");
        let directory = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(InMemoryAppointmentStore::new());
        let booking = BookingService::new(&config, directory.clone(), directory.clone(), store);
        (Self::new(config, booking), directory)
    }
}
