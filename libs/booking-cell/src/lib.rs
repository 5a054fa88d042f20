pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{BookingError, StoreError};
pub use router::booking_routes;
pub use services::BookingService;
pub use state::BookingState;
