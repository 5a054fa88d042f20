// libs/booking-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Weekday};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use availability_cell::{
    Appointment, AppointmentStatus, MinuteOfDay, Professional, WeeklySchedule, WorkingHours,
};
use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Service, ServicePayload, StoreError};
use crate::services::store::{AppointmentStore, ServiceCatalog, WorkingHoursProvider};

// ==============================================================================
// ROW MODELS
// ==============================================================================

/// `working_hours` row. `weekday` is ISO numbered, Monday = 1.
#[derive(Debug, Serialize, Deserialize)]
struct WorkingHoursRow {
    professional_id: Uuid,
    weekday: i16,
    #[serde(default)]
    start_time: Option<MinuteOfDay>,
    #[serde(default)]
    end_time: Option<MinuteOfDay>,
    #[serde(default)]
    break_start: Option<MinuteOfDay>,
    #[serde(default)]
    break_end: Option<MinuteOfDay>,
    #[serde(default)]
    unavailable: bool,
}

impl WorkingHoursRow {
    fn new(professional_id: Uuid, weekday: Weekday, hours: WorkingHours) -> Self {
        Self {
            professional_id,
            weekday: weekday.number_from_monday() as i16,
            start_time: hours.start,
            end_time: hours.end,
            break_start: hours.break_start,
            break_end: hours.break_end,
            unavailable: hours.unavailable,
        }
    }

    fn into_entry(self) -> Option<(Weekday, WorkingHours)> {
        let weekday = weekday_from_iso(self.weekday)?;
        Some((weekday, WorkingHours {
            start: self.start_time,
            end: self.end_time,
            break_start: self.break_start,
            break_end: self.break_end,
            unavailable: self.unavailable,
        }))
    }
}

fn weekday_from_iso(number: i16) -> Option<Weekday> {
    match number {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

fn backend_error(context: &str, err: anyhow::Error) -> StoreError {
    error!("{} failed: {}", context, err);
    StoreError::Backend(format!("{}: {}", context, err))
}

// ==============================================================================
// DIRECTORY
// ==============================================================================

/// Professionals, working hours and services backed by PostgREST tables.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl WorkingHoursProvider for SupabaseDirectory {
    async fn professional(&self, professional_id: Uuid) -> Result<Option<Professional>, StoreError> {
        let path = format!(
            "/rest/v1/professionals?id=eq.{}&select=id,display_name,timezone",
            professional_id
        );

        let rows: Vec<Professional> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| backend_error("Fetching professional", e))?;

        Ok(rows.into_iter().next())
    }

    async fn weekly_schedule(&self, professional_id: Uuid) -> Result<WeeklySchedule, StoreError> {
        let path = format!("/rest/v1/working_hours?professional_id=eq.{}", professional_id);

        let rows: Vec<WorkingHoursRow> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| backend_error("Fetching working hours", e))?;

        let mut schedule = WeeklySchedule::new();
        for row in rows {
            let number = row.weekday;
            match row.into_entry() {
                Some((weekday, hours)) => schedule.set(weekday, hours),
                None => warn!("Skipping working hours row with weekday {} for {}", number, professional_id),
            }
        }

        debug!("Loaded {} configured weekdays for {}", schedule.days.len(), professional_id);
        Ok(schedule)
    }

    async fn set_working_hours(
        &self,
        professional_id: Uuid,
        weekday: Weekday,
        hours: WorkingHours,
    ) -> Result<(), StoreError> {
        let row = WorkingHoursRow::new(professional_id, weekday, hours);
        let body = serde_json::to_value(&row)
            .map_err(|e| StoreError::Backend(format!("Encoding working hours: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("resolution=merge-duplicates,return=representation"));

        let _: Vec<serde_json::Value> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/working_hours?on_conflict=professional_id,weekday",
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| backend_error("Saving working hours", e))?;

        debug!("Saved working hours for {} on {}", professional_id, weekday);
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for SupabaseDirectory {
    async fn services(&self, service_ids: &[Uuid]) -> Result<Vec<Service>, StoreError> {
        if service_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = service_ids.iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/services?id=in.({})", ids);

        let rows: Vec<ServicePayload> = self.supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| backend_error("Fetching services", e))?;

        rows.into_iter()
            .map(|raw| Service::try_from(raw).map_err(|e| {
                warn!("Unusable service row: {}", e);
                StoreError::Backend(e.to_string())
            }))
            .collect()
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

/// Appointment store over the `appointments` table. Non-overlap is enforced by
/// an exclusion constraint that this repo does not create; the database must
/// carry one equivalent to
///
/// ```sql
/// ALTER TABLE appointments ADD CONSTRAINT appointments_no_overlap
///     EXCLUDE USING gist (
///         professional_id WITH =,
///         tsrange(date + start_time, date + end_time, '[)') WITH &&
///     )
///     WHERE (status <> 'cancelled' AND overlap_override IS NULL);
/// ```
///
/// (`btree_gist` is needed for the uuid equality). Rows carrying an
/// `overlap_override` must stay outside the constraint, otherwise audited
/// manual blocks get a 409. PostgREST answers 409 when the constraint fires.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str, context: &str) -> Result<Vec<Appointment>, StoreError> {
        self.supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| backend_error(context, e))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn appointments_for_day(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&date=eq.{}&order=start_time.asc",
            professional_id, date
        );
        self.fetch(&path, "Fetching appointments").await
    }

    async fn appointments_in_range(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc,start_time.asc",
            professional_id, from, to
        );
        self.fetch(&path, "Fetching appointment range").await
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.fetch(&path, "Fetching appointment").await?.into_iter().next())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(format!("Encoding appointment: {}", e)))?;

        let result: anyhow::Result<Vec<Appointment>> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await;

        match result {
            Ok(rows) => rows.into_iter()
                .next()
                .ok_or_else(|| StoreError::Backend("Insert returned no row".to_string())),
            Err(e) if matches!(e.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_))) => {
                warn!("Appointment {} rejected by the overlap constraint", appointment.id);
                Err(StoreError::SlotTaken { appointment_id: None })
            }
            Err(e) => Err(backend_error("Inserting appointment", e)),
        }
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        status: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", appointment_id, expected);

        let rows: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "status": status })),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| backend_error("Updating appointment status", e))?;

        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        // Nothing matched both filters: either the row is gone or its status moved
        match self.get(appointment_id).await? {
            Some(current) => {
                warn!("Status of {} changed to {} before the write", appointment_id, current.status);
                Err(StoreError::StatusChanged { appointment_id, expected })
            }
            None => Err(StoreError::NotFound(appointment_id)),
        }
    }
}
