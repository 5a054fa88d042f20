// libs/booking-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use availability_cell::{Appointment, AppointmentStatus, AvailabilityError, MinuteOfDay, OverlapOverride};
use shared_models::AppError;

// ==============================================================================
// SERVICES
// ==============================================================================

/// Canonical salon service. Everything past the collaborator boundary uses this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    #[serde(default)]
    pub requires_deposit: bool,
}

/// Service row as it may arrive from storage or older clients: price in
/// cents or in currency units under several names, duration under two names.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicePayload {
    pub id: Uuid,
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub requires_deposit: Option<bool>,
}

impl TryFrom<ServicePayload> for Service {
    type Error = BookingError;

    fn try_from(raw: ServicePayload) -> Result<Self, Self::Error> {
        let duration_minutes = raw.duration_minutes
            .or(raw.duration)
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| BookingError::ValidationError(
                format!("service {} has no positive duration", raw.id)
            ))?;

        let price_cents = match (raw.price_cents, raw.price.or(raw.amount)) {
            (Some(cents), _) => cents,
            (None, Some(units)) if units.is_finite() => (units * 100.0).round() as i64,
            _ => return Err(BookingError::ValidationError(
                format!("service {} has no price", raw.id)
            )),
        };

        if price_cents < 0 {
            return Err(BookingError::ValidationError(
                format!("service {} has a negative price", raw.id)
            ));
        }

        Ok(Self {
            id: raw.id,
            name: raw.name.unwrap_or_default(),
            duration_minutes,
            price_cents,
            requires_deposit: raw.requires_deposit.unwrap_or(false),
        })
    }
}

/// Aggregate of the services picked in one booking flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingQuote {
    pub service_ids: Vec<Uuid>,
    pub total_duration_minutes: i32,
    pub total_price_cents: i64,
    pub deposit_cents: i64,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub professional_id: Uuid,
    pub date: NaiveDate,
    pub start_time: MinuteOfDay,
    pub service_ids: Vec<Uuid>,
    #[serde(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub appointment: Appointment,
    pub quote: BookingQuote,
}

/// Professional-created calendar entry (time off, walk-in).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRequest {
    pub date: NaiveDate,
    pub start_time: MinuteOfDay,
    pub end_time: MinuteOfDay,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub overlap_override: Option<OverlapOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub service_ids: Vec<Uuid>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Slot already taken")]
    SlotTaken { appointment_id: Option<Uuid> },

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    /// A status write found the row no longer in the expected status.
    #[error("Appointment {appointment_id} is no longer {expected}")]
    StatusChanged { appointment_id: Uuid, expected: AppointmentStatus },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error(transparent)]
    Availability(#[from] AvailabilityError),

    #[error("Professional not found: {0}")]
    ProfessionalNotFound(Uuid),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Outside working hours: {0}")]
    OutsideWorkingHours(String),

    #[error("Requested time has already passed")]
    InPast,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    pub fn is_slot_taken(&self) -> bool {
        match self {
            BookingError::Availability(e) => e.is_slot_taken(),
            BookingError::Store(StoreError::SlotTaken { .. }) => true,
            _ => false,
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        if err.is_slot_taken() {
            return AppError::Conflict(availability_cell::error::SLOT_TAKEN_MESSAGE.to_string());
        }

        match err {
            BookingError::Availability(e) => match e {
                AvailabilityError::InvalidDuration(_) | AvailabilityError::MissingConfiguration { .. } => {
                    AppError::Unprocessable(e.user_message())
                }
                other => AppError::ValidationError(other.to_string()),
            },
            BookingError::ProfessionalNotFound(_) | BookingError::AppointmentNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            BookingError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            BookingError::OutsideWorkingHours(_) | BookingError::InPast => {
                AppError::Unprocessable(err.to_string())
            }
            BookingError::ValidationError(msg) => AppError::ValidationError(msg),
            BookingError::Store(StoreError::NotFound(id)) => AppError::NotFound(format!("Record not found: {}", id)),
            BookingError::Store(e @ StoreError::StatusChanged { .. }) => AppError::Conflict(e.to_string()),
            BookingError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> ServicePayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn normalizes_loose_price_shapes() {
        let id = Uuid::new_v4();
        let cents = Service::try_from(payload(json!({"id": id, "name": "Cut", "duration_minutes": 30, "price_cents": 2500}))).unwrap();
        let units = Service::try_from(payload(json!({"id": id, "title": "Cut", "duration": 30, "price": 25.0}))).unwrap();
        let amount = Service::try_from(payload(json!({"id": id, "name": "Cut", "duration": 30, "amount": 24.995}))).unwrap();

        assert_eq!(cents.price_cents, 2500);
        assert_eq!(units.price_cents, 2500);
        assert_eq!(units.name, "Cut");
        assert_eq!(amount.price_cents, 2500);
    }

    #[test]
    fn rejects_unusable_payloads() {
        let id = Uuid::new_v4();
        assert_matches!(
            Service::try_from(payload(json!({"id": id, "price": 10.0}))),
            Err(BookingError::ValidationError(_))
        );
        assert_matches!(
            Service::try_from(payload(json!({"id": id, "duration": 30}))),
            Err(BookingError::ValidationError(_))
        );
        assert_matches!(
            Service::try_from(payload(json!({"id": id, "duration": 30, "price_cents": -1}))),
            Err(BookingError::ValidationError(_))
        );
    }

    #[test]
    fn conflict_and_stale_read_share_the_client_message() {
        let conflict: AppError = BookingError::from(AvailabilityError::Conflict { appointment_id: Uuid::new_v4() }).into();
        let stale: AppError = BookingError::from(AvailabilityError::StaleRead { appointment_id: None }).into();

        assert_matches!(conflict, AppError::Conflict(ref msg) if msg == "This slot is no longer available");
        assert_matches!(stale, AppError::Conflict(ref msg) if msg == "This slot is no longer available");
    }

    #[test]
    fn concurrent_status_change_is_a_conflict() {
        let err: AppError = BookingError::from(StoreError::StatusChanged {
            appointment_id: Uuid::new_v4(),
            expected: AppointmentStatus::Pending,
        }).into();
        assert_matches!(err, AppError::Conflict(ref msg) if msg.ends_with("is no longer pending"));
    }
}
