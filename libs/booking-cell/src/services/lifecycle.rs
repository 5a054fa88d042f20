// libs/booking-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use availability_cell::AppointmentStatus;

use crate::models::BookingError;

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(BookingError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Valid next statuses. Nothing leaves a terminal state, so a cancelled
    /// entry can never take its interval back.
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::NoShow).is_ok());
        assert!(lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed).is_ok());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let lifecycle = AppointmentLifecycleService::new();

        for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled, AppointmentStatus::NoShow] {
            assert!(lifecycle.is_terminal(status));
            assert!(lifecycle.validate_status_transition(status, AppointmentStatus::Confirmed).is_err());
        }
    }

    #[test]
    fn test_pending_cannot_complete() {
        let lifecycle = AppointmentLifecycleService::new();
        let result = lifecycle.validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Completed);

        assert!(matches!(result, Err(BookingError::InvalidStatusTransition {
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Completed,
        })));
    }
}
