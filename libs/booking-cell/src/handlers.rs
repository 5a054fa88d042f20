// libs/booking-cell/src/handlers.rs
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc, Weekday};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use availability_cell::{RangeRequest, WorkingHours};
use shared_models::error::AppError;

use crate::models::{BlockRequest, BookingRequest, QuoteRequest, StatusUpdateRequest};
use crate::state::BookingState;

const DEFAULT_RANGE_DAYS: u32 = 7;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i32>,
    /// Comma-separated service ids; their durations are summed.
    pub service_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub days: Option<u32>,
    pub duration_minutes: Option<i32>,
    pub service_ids: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlanningQuery {
    pub date: NaiveDate,
}

fn parse_service_ids(raw: &str) -> Result<Vec<Uuid>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Uuid::parse_str(part)
            .map_err(|_| AppError::BadRequest(format!("Invalid service id: {}", part))))
        .collect()
}

async fn requested_duration(
    state: &BookingState,
    duration_minutes: Option<i32>,
    service_ids: Option<&str>,
) -> Result<i32, AppError> {
    match (duration_minutes, service_ids) {
        (Some(duration), _) => Ok(duration),
        (None, Some(raw)) => {
            let ids = parse_service_ids(raw)?;
            Ok(state.booking.total_duration(&ids).await?)
        }
        (None, None) => Err(AppError::BadRequest(
            "duration_minutes or service_ids is required".to_string()
        )),
    }
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_day_slots(
    State(state): State<BookingState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let duration = requested_duration(&state, query.duration_minutes, query.service_ids.as_deref()).await?;

    let availability = state.booking
        .day_availability(professional_id, query.date, duration, Utc::now())
        .await?;

    Ok(Json(json!({
        "professional_id": availability.professional_id,
        "date": availability.date,
        "service_duration_minutes": duration,
        "slots": availability.slots,
        "closed_reason": availability.closed_reason,
    })))
}

pub async fn get_range_availability(
    State(state): State<BookingState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Value>, AppError> {
    let duration = requested_duration(&state, query.duration_minutes, query.service_ids.as_deref()).await?;

    let request = RangeRequest {
        professional_id,
        from: query.from,
        days: query.days.unwrap_or(DEFAULT_RANGE_DAYS),
        service_duration_minutes: duration,
    };

    let grid = state.booking.range_availability(request, Utc::now()).await?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "from": query.from,
        "service_duration_minutes": duration,
        "days": grid,
    })))
}

// ==============================================================================
// PROFESSIONAL CALENDAR HANDLERS
// ==============================================================================

pub async fn get_planning(
    State(state): State<BookingState>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<PlanningQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking.planning(professional_id, query.date).await?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "date": query.date,
        "appointments": appointments,
    })))
}

pub async fn get_working_hours(
    State(state): State<BookingState>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = state.booking.weekly_schedule(professional_id).await?;
    Ok(Json(json!(schedule)))
}

pub async fn set_working_hours(
    State(state): State<BookingState>,
    Path((professional_id, weekday)): Path<(Uuid, String)>,
    Json(hours): Json<WorkingHours>,
) -> Result<Json<Value>, AppError> {
    let weekday: Weekday = weekday.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid weekday: {}", weekday)))?;

    let schedule = state.booking.set_working_hours(professional_id, weekday, hours).await?;
    Ok(Json(json!(schedule)))
}

pub async fn create_block(
    State(state): State<BookingState>,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<BlockRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state.booking.create_block(professional_id, request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "appointment": appointment }))))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn create_booking(
    State(state): State<BookingState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let confirmation = state.booking.book(request, Utc::now()).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "appointment": confirmation.appointment,
        "quote": confirmation.quote,
    }))))
}

pub async fn update_booking_status(
    State(state): State<BookingState>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.update_status(appointment_id, request.status).await?;
    Ok(Json(json!({ "appointment": appointment })))
}

pub async fn create_quote(
    State(state): State<BookingState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Value>, AppError> {
    let quote = state.booking.quote(&request.service_ids).await?;
    Ok(Json(json!(quote)))
}
