use axum::{
    Router,
    routing::get,
};

use booking_cell::{booking_routes, BookingState};

pub fn create_router(state: BookingState) -> Router {
    Router::new()
        .route("/", get(|| async { "Salon booking API is running!" }))
        .nest("/salon", booking_routes(state))
}
