// libs/booking-cell/src/router.rs
use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::handlers;
use crate::state::BookingState;

pub fn booking_routes(state: BookingState) -> Router {
    Router::new()
        // Client-facing availability
        .route("/professionals/{professional_id}/slots", get(handlers::get_day_slots))
        .route("/professionals/{professional_id}/availability", get(handlers::get_range_availability))

        // Professional calendar
        .route("/professionals/{professional_id}/planning", get(handlers::get_planning))
        .route("/professionals/{professional_id}/working-hours", get(handlers::get_working_hours))
        .route("/professionals/{professional_id}/working-hours/{weekday}", put(handlers::set_working_hours))
        .route("/professionals/{professional_id}/blocks", post(handlers::create_block))

        // Booking flow
        .route("/quotes", post(handlers::create_quote))
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings/{appointment_id}/status", patch(handlers::update_booking_status))

        .with_state(state)
}
