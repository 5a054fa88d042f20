// libs/availability-cell/src/services/schedule.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::AvailabilityError;
use crate::models::{
    Appointment, DayAvailability, MinuteOfDay, OpenInterval, Slot, SlotRequest,
    WeeklySchedule, WorkingHours, MINUTES_PER_DAY,
};
use crate::services::conflict::is_overlapping;
use crate::services::timezone::resolve_timezone;

/// Upper bound for week/month grids.
pub const MAX_RANGE_DAYS: u32 = 62;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub slot_step_minutes: u16,
    pub default_timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_step_minutes: 30,
            default_timezone: Tz::Europe__Paris,
        }
    }
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let defaults = Self::default();

        let slot_step_minutes = u16::try_from(config.slot_step_minutes)
            .ok()
            .filter(|step| (1..=MINUTES_PER_DAY).contains(step))
            .unwrap_or_else(|| {
                warn!("Slot step {} is out of range, using {}",
                      config.slot_step_minutes, defaults.slot_step_minutes);
                defaults.slot_step_minutes
            });

        Self {
            slot_step_minutes,
            default_timezone: resolve_timezone(Some(&config.default_timezone), defaults.default_timezone),
        }
    }
}

/// A multi-day grid request for week and month views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub professional_id: Uuid,
    pub from: NaiveDate,
    pub days: u32,
    pub service_duration_minutes: i32,
}

/// Open windows of a day: `[start, break_start)` and `[break_end, end)` when a
/// break is configured, else `[start, end)`. Closed or misconfigured days have none.
pub fn open_intervals(hours: &WorkingHours) -> Vec<OpenInterval> {
    if hours.unavailable {
        return Vec::new();
    }

    if let Err(e) = hours.validate() {
        warn!("Ignoring working hours: {}", e);
        return Vec::new();
    }

    match (hours.start, hours.end, hours.break_start, hours.break_end) {
        (Some(start), Some(end), Some(break_start), Some(break_end)) => vec![
            OpenInterval { start, end: break_start },
            OpenInterval { start: break_end, end },
        ],
        (Some(start), Some(end), _, _) => vec![OpenInterval { start, end }],
        _ => Vec::new(),
    }
}

/// Whether `[start, end)` fits entirely inside one open window of the day.
pub fn fits_working_hours(hours: Option<&WorkingHours>, start: MinuteOfDay, end: MinuteOfDay) -> bool {
    hours.map(open_intervals)
        .unwrap_or_default()
        .iter()
        .any(|interval| interval.start <= start && end <= interval.end && start < end)
}

/// Marks every slot whose `[time, time + duration)` leaves its window or
/// collides with an active appointment. Nothing is removed: unavailable slots
/// are rendered disabled.
pub fn filter_available_slots(
    day_slots: &[Slot],
    existing_appointments: &[Appointment],
    service_duration_minutes: i32,
) -> Vec<Slot> {
    day_slots.iter()
        .map(|slot| {
            let mut slot = slot.clone();
            slot.available = service_duration_minutes > 0
                && match slot.time.checked_add_minutes(service_duration_minutes) {
                    Some(candidate_end) => {
                        candidate_end <= slot.window_end()
                            && !is_overlapping(slot.time, candidate_end, existing_appointments)
                    }
                    None => false,
                };
            slot
        })
        .collect()
}

pub struct AvailabilityEngine {
    config: EngineConfig,
}

impl AvailabilityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_timezone(&self) -> Tz {
        self.config.default_timezone
    }

    /// Salon-local calendar day and minute at instant `now`.
    pub fn local_now(&self, tz: Tz, now: DateTime<Utc>) -> (NaiveDate, MinuteOfDay) {
        let local = now.with_timezone(&tz);
        (local.date_naive(), MinuteOfDay::from_naive_time(local.time()))
    }

    /// True when `start` on `date` is at or before the current minute in `tz`.
    pub fn is_in_past(&self, date: NaiveDate, start: MinuteOfDay, tz: Tz, now: DateTime<Utc>) -> bool {
        let (today, current) = self.local_now(tz, now);
        date < today || (date == today && start <= current)
    }

    /// Candidate start times for one day, on the configured step, anchored to
    /// the start of each open window. Past times are never offered.
    pub fn generate_day_schedule(
        &self,
        hours: Option<&WorkingHours>,
        date: NaiveDate,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Vec<Slot> {
        let Some(hours) = hours else {
            debug!("No working hours for {} ({}), day is closed", date, date.format("%A"));
            return Vec::new();
        };

        let (today, current) = self.local_now(tz, now);
        if date < today {
            return Vec::new();
        }
        let cutoff = (date == today).then_some(current);

        let step = i32::from(self.config.slot_step_minutes);
        let mut slots = Vec::new();

        for interval in open_intervals(hours) {
            let mut time = interval.start;
            while time < interval.end {
                if cutoff.map_or(true, |cutoff| time > cutoff) {
                    slots.push(Slot::new(time, interval.end));
                }
                match time.checked_add_minutes(step) {
                    Some(next) => time = next,
                    None => break,
                }
            }
        }

        debug!("Generated {} candidate slots for {}", slots.len(), date);
        slots
    }

    pub fn filter_available_slots(
        &self,
        day_slots: &[Slot],
        existing_appointments: &[Appointment],
        service_duration_minutes: i32,
    ) -> Vec<Slot> {
        filter_available_slots(day_slots, existing_appointments, service_duration_minutes)
    }

    /// Generate then filter one day for a professional. Appointments for other
    /// professionals or other days are ignored.
    pub fn compute_day_availability(
        &self,
        request: &SlotRequest,
        hours: Option<&WorkingHours>,
        tz: Tz,
        existing_appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<DayAvailability, AvailabilityError> {
        let duration = request.service_duration_minutes;
        ensure_positive_duration(duration)?;

        if let Some(hours) = hours {
            let longest = open_intervals(hours).iter().map(OpenInterval::length_minutes).max();
            if let Some(longest) = longest {
                if duration > longest {
                    return Err(AvailabilityError::InvalidDuration(format!(
                        "{} minutes does not fit any working window on {} (longest is {} minutes)",
                        duration, request.date, longest
                    )));
                }
            }
        }

        let closed_reason = missing_configuration(hours, request.date).map(|missing| {
            warn!(professional_id = %request.professional_id, "{}, {} is closed", missing, request.date);
            missing.to_string()
        });

        let day_appointments = appointments_on(existing_appointments, request.professional_id, request.date);
        let candidates = self.generate_day_schedule(hours, request.date, tz, now);
        let slots = filter_available_slots(&candidates, &day_appointments, duration);

        Ok(DayAvailability {
            professional_id: request.professional_id,
            date: request.date,
            slots,
            closed_reason,
        })
    }

    /// Consecutive days starting at `request.from`. A day where the service
    /// cannot fit simply has no available slot.
    pub fn compute_range_availability(
        &self,
        schedule: &WeeklySchedule,
        request: &RangeRequest,
        tz: Tz,
        existing_appointments: &[Appointment],
        now: DateTime<Utc>,
    ) -> Result<Vec<DayAvailability>, AvailabilityError> {
        ensure_positive_duration(request.service_duration_minutes)?;

        if request.days == 0 || request.days > MAX_RANGE_DAYS {
            return Err(AvailabilityError::InvalidRange(
                format!("days must be between 1 and {}, got {}", MAX_RANGE_DAYS, request.days)
            ));
        }

        let mut grid = Vec::with_capacity(request.days as usize);
        for offset in 0..request.days {
            let date = request.from
                .checked_add_signed(Duration::days(i64::from(offset)))
                .ok_or_else(|| AvailabilityError::InvalidRange("date out of range".to_string()))?;

            let hours = schedule.hours_for(date);
            let day_appointments = appointments_on(existing_appointments, request.professional_id, date);
            let candidates = self.generate_day_schedule(hours, date, tz, now);

            grid.push(DayAvailability {
                professional_id: request.professional_id,
                date,
                slots: filter_available_slots(&candidates, &day_appointments, request.service_duration_minutes),
                closed_reason: missing_configuration(hours, date).map(|missing| missing.to_string()),
            });
        }

        Ok(grid)
    }
}

/// A weekday without working hours is closed, not an error.
fn missing_configuration(hours: Option<&WorkingHours>, date: NaiveDate) -> Option<AvailabilityError> {
    hours.is_none().then(|| AvailabilityError::MissingConfiguration { weekday: date.weekday() })
}

fn ensure_positive_duration(duration: i32) -> Result<(), AvailabilityError> {
    if duration <= 0 {
        return Err(AvailabilityError::InvalidDuration(
            format!("service duration must be positive, got {} minutes", duration)
        ));
    }
    Ok(())
}

fn appointments_on(existing: &[Appointment], professional_id: Uuid, date: NaiveDate) -> Vec<Appointment> {
    existing.iter()
        .filter(|appointment| appointment.is_on(professional_id, date))
        .cloned()
        .collect()
}
