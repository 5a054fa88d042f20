// libs/booking-cell/src/services/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use availability_cell::{
    first_conflict_for, Appointment, AppointmentStatus, Professional, WeeklySchedule, WorkingHours,
};

use crate::models::{Service, StoreError};
use crate::services::store::{AppointmentStore, ServiceCatalog, WorkingHoursProvider};

/// Process-local directory used when no database is configured, and in tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    professionals: RwLock<HashMap<Uuid, Professional>>,
    schedules: RwLock<HashMap<Uuid, WeeklySchedule>>,
    services: RwLock<HashMap<Uuid, Service>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_professional(&self, professional: Professional, schedule: WeeklySchedule) {
        let id = professional.id;
        self.professionals.write().await.insert(id, professional);
        self.schedules.write().await.insert(id, schedule);
    }

    pub async fn add_service(&self, service: Service) {
        self.services.write().await.insert(service.id, service);
    }
}

#[async_trait]
impl WorkingHoursProvider for InMemoryDirectory {
    async fn professional(&self, professional_id: Uuid) -> Result<Option<Professional>, StoreError> {
        Ok(self.professionals.read().await.get(&professional_id).cloned())
    }

    async fn weekly_schedule(&self, professional_id: Uuid) -> Result<WeeklySchedule, StoreError> {
        Ok(self.schedules.read().await
            .get(&professional_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_working_hours(
        &self,
        professional_id: Uuid,
        weekday: Weekday,
        hours: WorkingHours,
    ) -> Result<(), StoreError> {
        if !self.professionals.read().await.contains_key(&professional_id) {
            return Err(StoreError::NotFound(professional_id));
        }

        self.schedules.write().await
            .entry(professional_id)
            .or_default()
            .set(weekday, hours);
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryDirectory {
    async fn services(&self, service_ids: &[Uuid]) -> Result<Vec<Service>, StoreError> {
        let services = self.services.read().await;
        Ok(service_ids.iter()
            .filter_map(|id| services.get(id).cloned())
            .collect())
    }
}

/// Appointment store whose insert re-checks overlaps under the write lock.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn appointments_for_day(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.appointments_in_range(professional_id, date, date).await
    }

    async fn appointments_in_range(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments.values()
            .filter(|a| a.professional_id == professional_id && from <= a.date && a.date <= to)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.date, a.start_time));
        Ok(found)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&appointment_id).cloned())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        if appointments.contains_key(&appointment.id) {
            return Err(StoreError::Backend(format!("duplicate appointment id {}", appointment.id)));
        }

        if appointment.overlap_override.is_none() {
            if let Some(existing) = first_conflict_for(
                appointment.professional_id,
                appointment.date,
                appointment.start_time,
                appointment.end_time,
                appointments.values(),
            ) {
                debug!("Insert rejected, {} overlaps {}", appointment.id, existing.id);
                return Err(StoreError::SlotTaken { appointment_id: Some(existing.id) });
            }
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments.get_mut(&appointment_id)
            .ok_or(StoreError::NotFound(appointment_id))?;
        if appointment.status != expected {
            debug!("Status write on {} expected {}, found {}", appointment_id, expected, appointment.status);
            return Err(StoreError::StatusChanged { appointment_id, expected });
        }
        appointment.status = status;
        Ok(appointment.clone())
    }
}
