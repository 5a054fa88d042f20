// libs/booking-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use uuid::Uuid;

use availability_cell::{Appointment, AppointmentStatus, Professional, WeeklySchedule, WorkingHours};

use crate::models::{Service, StoreError};

/// Source of professionals and their weekly opening hours.
#[async_trait]
pub trait WorkingHoursProvider: Send + Sync {
    async fn professional(&self, professional_id: Uuid) -> Result<Option<Professional>, StoreError>;

    async fn weekly_schedule(&self, professional_id: Uuid) -> Result<WeeklySchedule, StoreError>;

    async fn set_working_hours(
        &self,
        professional_id: Uuid,
        weekday: Weekday,
        hours: WorkingHours,
    ) -> Result<(), StoreError>;
}

/// Salon service catalogue. Implementations return canonical `Service`
/// values; loose storage shapes are normalized before they leave the adapter.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn services(&self, service_ids: &[Uuid]) -> Result<Vec<Service>, StoreError>;
}

/// Persistence for calendar entries. Appointments are never deleted; a
/// cancellation is a status change.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Every entry of the professional on `date`, cancelled ones included.
    async fn appointments_for_day(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Entries with `from <= date <= to`.
    async fn appointments_in_range(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Persists a new entry. Entries without an overlap override must not
    /// collide with an active entry of the same professional; the store
    /// answers `SlotTaken` when one does.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Compare-and-set on the status: the write only lands when the row is
    /// still `expected`, otherwise `StatusChanged`.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;
}
