// libs/availability-cell/src/models.rs
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::AvailabilityError;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

// ==============================================================================
// WALL-CLOCK TIME
// ==============================================================================

/// Minutes since local midnight, `0..=1440`. `24:00` only makes sense as a closing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub const MIDNIGHT: MinuteOfDay = MinuteOfDay(0);
    pub const END_OF_DAY: MinuteOfDay = MinuteOfDay(MINUTES_PER_DAY);

    pub fn new(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        hour.checked_mul(60)
            .and_then(|m| m.checked_add(minute))
            .and_then(Self::new)
    }

    /// Seconds are dropped: 10:00:59 is minute 10:00.
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    /// `None` when the result leaves `00:00..=24:00`.
    pub fn checked_add_minutes(self, minutes: i32) -> Option<Self> {
        let total = i32::from(self.0).checked_add(minutes)?;
        u16::try_from(total).ok().and_then(Self::new)
    }

    pub fn minutes_until(self, later: MinuteOfDay) -> i32 {
        i32::from(later.0) - i32::from(self.0)
    }

    pub fn parse(raw: &str) -> Result<Self, AvailabilityError> {
        let invalid = || AvailabilityError::InvalidTime(format!("expected HH:MM, got {:?}", raw));

        let parts: Vec<&str> = raw.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            numbers.push(part.parse::<u16>().map_err(|_| invalid())?);
        }

        let (hour, minute) = (numbers[0], numbers[1]);
        if let Some(&seconds) = numbers.get(2) {
            if seconds >= 60 || (hour == 24 && seconds != 0) {
                return Err(invalid());
            }
        }

        Self::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for MinuteOfDay {
    type Err = AvailabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MinuteOfDay::parse(&raw).map_err(de::Error::custom)
    }
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

/// One weekday of a professional's configuration, as the working hours
/// provider hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkingHours {
    #[serde(alias = "startTime")]
    pub start: Option<MinuteOfDay>,
    #[serde(alias = "endTime")]
    pub end: Option<MinuteOfDay>,
    #[serde(default, alias = "breakStart")]
    pub break_start: Option<MinuteOfDay>,
    #[serde(default, alias = "breakEnd")]
    pub break_end: Option<MinuteOfDay>,
    #[serde(default)]
    pub unavailable: bool,
}

impl WorkingHours {
    pub fn open(start: MinuteOfDay, end: MinuteOfDay) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn with_break(mut self, break_start: MinuteOfDay, break_end: MinuteOfDay) -> Self {
        self.break_start = Some(break_start);
        self.break_end = Some(break_end);
        self
    }

    pub fn closed() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn has_break(&self) -> bool {
        self.break_start.is_some() && self.break_end.is_some()
    }

    /// `start < end`, and `start < break_start < break_end < end` when a break is set.
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.unavailable {
            return Ok(());
        }

        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(AvailabilityError::InvalidWorkingHours(
                "start and end are required unless the day is unavailable".to_string()
            )),
        };

        if start >= end {
            return Err(AvailabilityError::InvalidWorkingHours(
                format!("start {} must be before end {}", start, end)
            ));
        }

        match (self.break_start, self.break_end) {
            (None, None) => Ok(()),
            (Some(break_start), Some(break_end)) => {
                if start < break_start && break_start < break_end && break_end < end {
                    Ok(())
                } else {
                    Err(AvailabilityError::InvalidWorkingHours(format!(
                        "break {}-{} must sit strictly inside {}-{}",
                        break_start, break_end, start, end
                    )))
                }
            }
            _ => Err(AvailabilityError::InvalidWorkingHours(
                "break_start and break_end must be set together".to_string()
            )),
        }
    }
}

/// A half-open `[start, end)` window in which services may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenInterval {
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
}

impl OpenInterval {
    pub fn length_minutes(&self) -> i32 {
        self.start.minutes_until(self.end)
    }

    pub fn contains(&self, time: MinuteOfDay) -> bool {
        self.start <= time && time < self.end
    }
}

/// Weekday to working hours. A weekday with no entry is treated as closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WeeklySchedule {
    #[serde(default)]
    pub days: HashMap<Weekday, WorkingHours>,
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, weekday: Weekday, hours: WorkingHours) {
        self.days.insert(weekday, hours);
    }

    pub fn with_day(mut self, weekday: Weekday, hours: WorkingHours) -> Self {
        self.set(weekday, hours);
        self
    }

    pub fn hours_for_weekday(&self, weekday: Weekday) -> Option<&WorkingHours> {
        self.days.get(&weekday)
    }

    pub fn hours_for(&self, date: NaiveDate) -> Option<&WorkingHours> {
        self.hours_for_weekday(date.weekday())
    }
}

// ==============================================================================
// PROFESSIONALS AND APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub display_name: String,
    /// IANA zone name; the salon default applies when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Everything except a cancellation keeps the seat taken.
    pub fn occupies_time(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[default]
    ClientBooking,
    ManualBlock,
}

/// Explicit permission for a manual block to sit on top of existing bookings
/// (walk-ins, deliberate double seats). Kept on the record so it can be audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapOverride {
    pub created_by: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl OverlapOverride {
    pub fn new(created_by: impl Into<String>, reason: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by: created_by.into(),
            reason: reason.into(),
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.created_by.trim().is_empty() {
            return Err(AvailabilityError::InvalidOverride("created_by is required".to_string()));
        }
        if self.reason.trim().is_empty() {
            return Err(AvailabilityError::InvalidOverride("reason is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub professional_id: Uuid,
    /// Salon-local calendar day the appointment is anchored to.
    pub date: NaiveDate,
    pub start_time: MinuteOfDay,
    pub end_time: MinuteOfDay,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub kind: AppointmentKind,
    #[serde(default)]
    pub overlap_override: Option<OverlapOverride>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub service_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(professional_id: Uuid, date: NaiveDate, start_time: MinuteOfDay, end_time: MinuteOfDay) -> Self {
        Self {
            id: Uuid::new_v4(),
            professional_id,
            date,
            start_time,
            end_time,
            status: AppointmentStatus::Confirmed,
            kind: AppointmentKind::ClientBooking,
            overlap_override: None,
            client_name: None,
            service_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: AppointmentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn occupies_time(&self) -> bool {
        self.status.occupies_time()
    }

    pub fn duration_minutes(&self) -> i32 {
        self.start_time.minutes_until(self.end_time)
    }

    pub fn is_on(&self, professional_id: Uuid, date: NaiveDate) -> bool {
        self.professional_id == professional_id && self.date == date
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub professional_id: Uuid,
    pub date: NaiveDate,
    pub service_duration_minutes: i32,
}

/// A candidate start time on the grid. Serialises as `{time, available}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub time: MinuteOfDay,
    pub available: bool,
    /// Closing time of the open interval the slot was generated from.
    #[serde(skip)]
    window_end: MinuteOfDay,
}

impl Slot {
    pub fn new(time: MinuteOfDay, window_end: MinuteOfDay) -> Self {
        Self {
            time,
            available: true,
            window_end,
        }
    }

    pub fn window_end(&self) -> MinuteOfDay {
        self.window_end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub professional_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
    /// Set when the day is closed because its weekday has no working hours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_reason: Option<String>,
}

impl DayAvailability {
    pub fn available_times(&self) -> Vec<MinuteOfDay> {
        self.slots.iter()
            .filter(|slot| slot.available)
            .map(|slot| slot.time)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(raw: &str) -> MinuteOfDay {
        MinuteOfDay::parse(raw).unwrap()
    }

    #[test]
    fn parses_and_formats_wall_clock() {
        assert_eq!(t("09:30").minutes(), 570);
        assert_eq!(t("9:05").to_string(), "09:05");
        assert_eq!(t("17:45:00").to_string(), "17:45");
        assert_eq!(t("24:00"), MinuteOfDay::END_OF_DAY);
    }

    #[test]
    fn rejects_malformed_times() {
        for raw in ["", "9", "24:01", "12:60", "ab:cd", "-1:00", "12:00:75", "+9:00", "123:00"] {
            assert_matches!(MinuteOfDay::parse(raw), Err(AvailabilityError::InvalidTime(_)), "{raw}");
        }
    }

    #[test]
    fn checked_add_stays_inside_the_day() {
        assert_eq!(t("23:30").checked_add_minutes(30), Some(MinuteOfDay::END_OF_DAY));
        assert_eq!(t("23:30").checked_add_minutes(31), None);
        assert_eq!(t("00:10").checked_add_minutes(-20), None);
    }

    #[test]
    fn serde_uses_hh_mm_strings() {
        let hours: WorkingHours = serde_json::from_str(
            r#"{"startTime":"09:00","endTime":"18:00","breakStart":"12:00","breakEnd":"14:00"}"#
        ).unwrap();
        assert_eq!(hours, WorkingHours::open(t("09:00"), t("18:00")).with_break(t("12:00"), t("14:00")));

        let json = serde_json::to_value(Slot::new(t("10:30"), t("12:00"))).unwrap();
        assert_eq!(json, serde_json::json!({"time": "10:30", "available": true}));
    }

    #[test]
    fn working_hours_invariants() {
        assert!(WorkingHours::open(t("09:00"), t("18:00")).validate().is_ok());
        assert!(WorkingHours::closed().validate().is_ok());
        assert_matches!(
            WorkingHours::open(t("18:00"), t("09:00")).validate(),
            Err(AvailabilityError::InvalidWorkingHours(_))
        );
        assert_matches!(
            WorkingHours::open(t("09:00"), t("18:00")).with_break(t("09:00"), t("10:00")).validate(),
            Err(AvailabilityError::InvalidWorkingHours(_))
        );
        let mut half_break = WorkingHours::open(t("09:00"), t("18:00"));
        half_break.break_start = Some(t("12:00"));
        assert_matches!(half_break.validate(), Err(AvailabilityError::InvalidWorkingHours(_)));
    }

    #[test]
    fn cancelled_appointments_free_their_time() {
        let appointment = Appointment::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), t("10:00"), t("11:00"));
        assert!(appointment.occupies_time());
        assert!(!appointment.with_status(AppointmentStatus::Cancelled).occupies_time());
    }

    #[test]
    fn override_requires_author_and_reason() {
        let now = Utc::now();
        assert!(OverlapOverride::new("pro-1", "walk-in", now).validate().is_ok());
        assert_matches!(OverlapOverride::new("pro-1", "  ", now).validate(), Err(AvailabilityError::InvalidOverride(_)));
        assert_matches!(OverlapOverride::new("", "walk-in", now).validate(), Err(AvailabilityError::InvalidOverride(_)));
    }
}
