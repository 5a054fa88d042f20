use chrono::Weekday;
use thiserror::Error;
use uuid::Uuid;

pub const SLOT_TAKEN_MESSAGE: &str = "This slot is no longer available";
pub const NO_AVAILABILITY_MESSAGE: &str = "No availability for this service on this day";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvailabilityError {
    /// The requested interval overlaps an active appointment.
    #[error("This slot is no longer available (conflicts with appointment {appointment_id})")]
    Conflict { appointment_id: Uuid },

    /// The engine check passed but the store rejected the insert because a
    /// concurrent writer got there first.
    #[error("This slot is no longer available (taken concurrently)")]
    StaleRead { appointment_id: Option<Uuid> },

    #[error("Invalid service duration: {0}")]
    InvalidDuration(String),

    #[error("No working hours configured for {weekday}")]
    MissingConfiguration { weekday: Weekday },

    #[error("Invalid working hours: {0}")]
    InvalidWorkingHours(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid overlap override: {0}")]
    InvalidOverride(String),
}

impl AvailabilityError {
    /// Conflict and StaleRead look the same to the client; only telemetry tells them apart.
    pub fn is_slot_taken(&self) -> bool {
        matches!(self, AvailabilityError::Conflict { .. } | AvailabilityError::StaleRead { .. })
    }

    pub fn user_message(&self) -> String {
        match self {
            AvailabilityError::Conflict { .. } | AvailabilityError::StaleRead { .. } => {
                SLOT_TAKEN_MESSAGE.to_string()
            }
            AvailabilityError::InvalidDuration(_) | AvailabilityError::MissingConfiguration { .. } => {
                NO_AVAILABILITY_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}
