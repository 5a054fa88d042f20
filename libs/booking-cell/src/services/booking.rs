// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use availability_cell::{
    fits_working_hours, professional_timezone, validate_booking_request, validate_with_override,
    Appointment, AppointmentKind, AppointmentStatus, AvailabilityEngine, AvailabilityError,
    DayAvailability, EngineConfig, Professional, MAX_RANGE_DAYS, RangeRequest, SlotRequest, WeeklySchedule,
    WorkingHours,
};
use shared_config::AppConfig;

use crate::models::{
    BlockRequest, BookingConfirmation, BookingError, BookingQuote, BookingRequest, Service, StoreError,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::locks::SchedulingLocks;
use crate::services::pricing::PricingService;
use crate::services::store::{AppointmentStore, ServiceCatalog, WorkingHoursProvider};

/// Booking orchestration: reads through the collaborators, asks the engine,
/// and commits with a check-and-insert that holds the professional's day lock.
pub struct BookingService {
    engine: AvailabilityEngine,
    directory: Arc<dyn WorkingHoursProvider>,
    catalog: Arc<dyn ServiceCatalog>,
    store: Arc<dyn AppointmentStore>,
    pricing: PricingService,
    lifecycle: AppointmentLifecycleService,
    locks: SchedulingLocks,
}

impl BookingService {
    pub fn new(
        config: &AppConfig,
        directory: Arc<dyn WorkingHoursProvider>,
        catalog: Arc<dyn ServiceCatalog>,
        store: Arc<dyn AppointmentStore>,
    ) -> Self {
        Self {
            engine: AvailabilityEngine::new(EngineConfig::from_app_config(config)),
            directory,
            catalog,
            store,
            pricing: PricingService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
            locks: SchedulingLocks::new(),
        }
    }

    pub fn engine(&self) -> &AvailabilityEngine {
        &self.engine
    }

    // ==============================================================================
    // READ SIDE
    // ==============================================================================

    async fn load_professional(&self, professional_id: Uuid) -> Result<(Professional, Tz), BookingError> {
        let professional = self.directory
            .professional(professional_id)
            .await?
            .ok_or(BookingError::ProfessionalNotFound(professional_id))?;

        let tz = professional_timezone(&professional, self.engine.default_timezone());
        Ok((professional, tz))
    }

    /// Resolve service ids against the catalogue. Every id must be known.
    pub async fn resolve_services(&self, service_ids: &[Uuid]) -> Result<Vec<Service>, BookingError> {
        let found = self.catalog.services(service_ids).await?;

        let mut services = Vec::with_capacity(service_ids.len());
        for id in service_ids {
            let service = found.iter()
                .find(|service| service.id == *id)
                .cloned()
                .ok_or_else(|| BookingError::ValidationError(format!("Unknown service {}", id)))?;
            services.push(service);
        }
        Ok(services)
    }

    pub async fn quote(&self, service_ids: &[Uuid]) -> Result<BookingQuote, BookingError> {
        let services = self.resolve_services(service_ids).await?;
        Ok(self.pricing.quote(&services)?)
    }

    pub async fn total_duration(&self, service_ids: &[Uuid]) -> Result<i32, BookingError> {
        Ok(self.quote(service_ids).await?.total_duration_minutes)
    }

    pub async fn day_availability(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        service_duration_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<DayAvailability, BookingError> {
        let (_, tz) = self.load_professional(professional_id).await?;
        let schedule = self.directory.weekly_schedule(professional_id).await?;
        let existing = self.store.appointments_for_day(professional_id, date).await?;

        let request = SlotRequest {
            professional_id,
            date,
            service_duration_minutes,
        };

        let availability = self.engine.compute_day_availability(
            &request,
            schedule.hours_for(date),
            tz,
            &existing,
            now,
        )?;

        debug!("{} of {} slots available for {} on {}",
               availability.available_times().len(), availability.slots.len(), professional_id, date);
        Ok(availability)
    }

    pub async fn range_availability(
        &self,
        request: RangeRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<DayAvailability>, BookingError> {
        let (_, tz) = self.load_professional(request.professional_id).await?;
        if request.days == 0 || request.days > MAX_RANGE_DAYS {
            return Err(AvailabilityError::InvalidRange(
                format!("days must be between 1 and {}, got {}", MAX_RANGE_DAYS, request.days)
            ).into());
        }
        let schedule = self.directory.weekly_schedule(request.professional_id).await?;

        let last_day = request.from
            .checked_add_signed(Duration::days(i64::from(request.days - 1)))
            .ok_or_else(|| AvailabilityError::InvalidRange("date out of range".to_string()))?;
        let existing = self.store
            .appointments_in_range(request.professional_id, request.from, last_day)
            .await?;

        Ok(self.engine.compute_range_availability(&schedule, &request, tz, &existing, now)?)
    }

    /// The day's calendar for the professional view, sorted by start time.
    /// Cancelled entries are kept so the planning can show them.
    pub async fn planning(&self, professional_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        self.load_professional(professional_id).await?;

        let mut appointments = self.store.appointments_for_day(professional_id, date).await?;
        appointments.sort_by_key(|a| (a.start_time, a.end_time));
        Ok(appointments)
    }

    pub async fn weekly_schedule(&self, professional_id: Uuid) -> Result<WeeklySchedule, BookingError> {
        self.load_professional(professional_id).await?;
        Ok(self.directory.weekly_schedule(professional_id).await?)
    }

    // ==============================================================================
    // WRITE SIDE
    // ==============================================================================

    pub async fn set_working_hours(
        &self,
        professional_id: Uuid,
        weekday: Weekday,
        hours: WorkingHours,
    ) -> Result<WeeklySchedule, BookingError> {
        hours.validate()?;
        self.load_professional(professional_id).await?;

        self.directory.set_working_hours(professional_id, weekday, hours).await?;
        info!("Working hours updated for {} on {}", professional_id, weekday);

        Ok(self.directory.weekly_schedule(professional_id).await?)
    }

    /// Book a client appointment. The conflict check runs again under the
    /// day lock against a fresh read; the `available` flag a client saw
    /// earlier is never trusted.
    #[instrument(skip(self, request, now), fields(professional_id = %request.professional_id, date = %request.date, start = %request.start_time))]
    pub async fn book(&self, request: BookingRequest, now: DateTime<Utc>) -> Result<BookingConfirmation, BookingError> {
        let services = self.resolve_services(&request.service_ids).await?;
        let quote = self.pricing.quote(&services)?;

        let start = request.start_time;
        let end = start
            .checked_add_minutes(quote.total_duration_minutes)
            .ok_or_else(|| BookingError::OutsideWorkingHours(
                format!("{} minutes from {} runs past midnight", quote.total_duration_minutes, start)
            ))?;

        let (_, tz) = self.load_professional(request.professional_id).await?;
        if self.engine.is_in_past(request.date, start, tz, now) {
            return Err(BookingError::InPast);
        }

        let schedule = self.directory.weekly_schedule(request.professional_id).await?;
        if !fits_working_hours(schedule.hours_for(request.date), start, end) {
            return Err(BookingError::OutsideWorkingHours(
                format!("{}-{} on {} is not inside an open window", start, end, request.date)
            ));
        }

        let _guard = self.locks.acquire(request.professional_id, request.date).await;

        let existing = self.store.appointments_for_day(request.professional_id, request.date).await?;
        validate_booking_request(start, end, &existing)?;

        let mut appointment = Appointment::new(request.professional_id, request.date, start, end);
        appointment.status = if quote.deposit_cents > 0 {
            AppointmentStatus::Pending
        } else {
            AppointmentStatus::Confirmed
        };
        appointment.client_name = request.client_name;
        appointment.service_ids = quote.service_ids.clone();
        appointment.created_at = now;

        let appointment = self.commit(appointment).await?;

        info!("Booked appointment {} ({}-{}, {})", appointment.id, start, end, appointment.status);
        Ok(BookingConfirmation { appointment, quote })
    }

    /// Create a manual block. With an override it may sit on top of existing
    /// entries; every overridden collision goes to the audit log.
    #[instrument(skip(self, request, now), fields(professional_id = %professional_id, date = %request.date))]
    pub async fn create_block(
        &self,
        professional_id: Uuid,
        request: BlockRequest,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookingError> {
        if request.start_time >= request.end_time {
            return Err(BookingError::ValidationError(
                format!("block start {} must be before its end {}", request.start_time, request.end_time)
            ));
        }
        self.load_professional(professional_id).await?;

        let _guard = self.locks.acquire(professional_id, request.date).await;

        let existing = self.store.appointments_for_day(professional_id, request.date).await?;
        validate_with_override(
            request.start_time,
            request.end_time,
            &existing,
            request.overlap_override.as_ref(),
        )?;

        let mut appointment = Appointment::new(professional_id, request.date, request.start_time, request.end_time);
        appointment.kind = AppointmentKind::ManualBlock;
        appointment.client_name = request.label;
        appointment.overlap_override = request.overlap_override;
        appointment.created_at = now;

        let appointment = self.commit(appointment).await?;

        info!("Created manual block {} ({}-{})", appointment.id, appointment.start_time, appointment.end_time);
        Ok(appointment)
    }

    async fn commit(&self, appointment: Appointment) -> Result<Appointment, BookingError> {
        match self.store.insert(appointment).await {
            Ok(appointment) => Ok(appointment),
            Err(StoreError::SlotTaken { appointment_id }) => {
                warn!(stale_read = true, "Store rejected insert after a passing check");
                Err(AvailabilityError::StaleRead { appointment_id }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move an appointment along its lifecycle. The read, the transition check
    /// and the write run under the appointment's day lock, and the store write
    /// is a compare-and-set on the status that was checked.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let located = self.store
            .get(appointment_id)
            .await?
            .ok_or(BookingError::AppointmentNotFound(appointment_id))?;

        let _guard = self.locks.acquire(located.professional_id, located.date).await;

        let current = self.store
            .get(appointment_id)
            .await?
            .ok_or(BookingError::AppointmentNotFound(appointment_id))?;

        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let updated = self.store.update_status(appointment_id, current.status, new_status).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }
}
