use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{BookingQuote, Service};
use availability_cell::AvailabilityError;

pub struct PricingService {
    deposit_percent: u32,
}

impl PricingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_deposit_percent(config.deposit_percent)
    }

    pub fn with_deposit_percent(deposit_percent: u32) -> Self {
        Self {
            deposit_percent: deposit_percent.min(100),
        }
    }

    /// Sum durations and prices of the selected services. The schedule is
    /// searched with the total duration, so 45 + 30 minutes needs 75 free minutes.
    pub fn quote(&self, services: &[Service]) -> Result<BookingQuote, AvailabilityError> {
        if services.is_empty() {
            return Err(AvailabilityError::InvalidDuration("no service selected".to_string()));
        }

        debug!("Quoting {} services", services.len());

        let mut total_duration_minutes: i32 = 0;
        let mut total_price_cents: i64 = 0;

        for service in services {
            if service.duration_minutes <= 0 {
                return Err(AvailabilityError::InvalidDuration(
                    format!("service {} has a duration of {} minutes", service.id, service.duration_minutes)
                ));
            }
            total_duration_minutes = total_duration_minutes
                .checked_add(service.duration_minutes)
                .ok_or_else(|| AvailabilityError::InvalidDuration("total duration overflows".to_string()))?;
            total_price_cents = total_price_cents.saturating_add(service.price_cents);
        }

        let deposit_cents = if services.iter().any(|s| s.requires_deposit) {
            self.deposit_for(total_price_cents)
        } else {
            0
        };

        info!("Quote: {} minutes, {} cents, deposit {} cents",
              total_duration_minutes, total_price_cents, deposit_cents);

        Ok(BookingQuote {
            service_ids: services.iter().map(|s| s.id).collect(),
            total_duration_minutes,
            total_price_cents,
            deposit_cents,
        })
    }

    /// Deposit share of a total, rounded up to the cent.
    pub fn deposit_for(&self, total_price_cents: i64) -> i64 {
        let percent = i64::from(self.deposit_percent);
        (total_price_cents.saturating_mul(percent) + 99) / 100
    }

    pub fn deposit_percent(&self) -> u32 {
        self.deposit_percent
    }
}
