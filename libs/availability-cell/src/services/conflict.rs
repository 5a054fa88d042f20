// libs/availability-cell/src/services/conflict.rs
use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AvailabilityError;
use crate::models::{Appointment, MinuteOfDay, OverlapOverride};

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share a minute.
/// An interval ending at 10:00 does not touch one starting at 10:00.
pub fn intervals_overlap(
    a_start: MinuteOfDay,
    a_end: MinuteOfDay,
    b_start: MinuteOfDay,
    b_end: MinuteOfDay,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First active appointment colliding with `[start, end)`. Cancelled entries never collide.
pub fn first_conflict<'a>(
    start: MinuteOfDay,
    end: MinuteOfDay,
    existing: impl IntoIterator<Item = &'a Appointment>,
) -> Option<&'a Appointment> {
    existing.into_iter()
        .filter(|appointment| appointment.occupies_time())
        .find(|appointment| intervals_overlap(start, end, appointment.start_time, appointment.end_time))
}

pub fn is_overlapping<'a>(
    start: MinuteOfDay,
    end: MinuteOfDay,
    existing: impl IntoIterator<Item = &'a Appointment>,
) -> bool {
    first_conflict(start, end, existing).is_some()
}

/// Same as [`first_conflict`] but ignores entries belonging to another
/// professional or another calendar day.
pub fn first_conflict_for<'a>(
    professional_id: Uuid,
    date: NaiveDate,
    start: MinuteOfDay,
    end: MinuteOfDay,
    existing: impl IntoIterator<Item = &'a Appointment>,
) -> Option<&'a Appointment> {
    first_conflict(
        start,
        end,
        existing.into_iter().filter(move |appointment| appointment.is_on(professional_id, date)),
    )
}

/// Authoritative check run at commit time. Never rely on an `available` flag
/// the client read earlier.
pub fn validate_booking_request<'a>(
    start: MinuteOfDay,
    end: MinuteOfDay,
    existing: impl IntoIterator<Item = &'a Appointment>,
) -> Result<(), AvailabilityError> {
    ensure_ordered(start, end)?;

    if let Some(conflict) = first_conflict(start, end, existing) {
        warn!("Booking {}-{} conflicts with appointment {} ({}-{})",
              start, end, conflict.id, conflict.start_time, conflict.end_time);
        return Err(AvailabilityError::Conflict { appointment_id: conflict.id });
    }

    debug!("Booking {}-{} is free", start, end);
    Ok(())
}

/// Like [`validate_booking_request`], but an override lets the interval sit on
/// top of existing entries. Every bypassed collision is logged on the `audit` target.
pub fn validate_with_override<'a>(
    start: MinuteOfDay,
    end: MinuteOfDay,
    existing: impl IntoIterator<Item = &'a Appointment>,
    overlap_override: Option<&OverlapOverride>,
) -> Result<(), AvailabilityError> {
    let Some(overlap_override) = overlap_override else {
        return validate_booking_request(start, end, existing);
    };

    overlap_override.validate()?;
    ensure_ordered(start, end)?;

    for appointment in existing.into_iter().filter(|a| a.occupies_time()) {
        if intervals_overlap(start, end, appointment.start_time, appointment.end_time) {
            info!(
                target: "audit",
                created_by = %overlap_override.created_by,
                reason = %overlap_override.reason,
                overlapped_appointment = %appointment.id,
                "Overlap override applied for {}-{}", start, end
            );
        }
    }

    Ok(())
}

fn ensure_ordered(start: MinuteOfDay, end: MinuteOfDay) -> Result<(), AvailabilityError> {
    if start >= end {
        return Err(AvailabilityError::InvalidDuration(
            format!("start {} must be before end {}", start, end)
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn t(raw: &str) -> MinuteOfDay {
        MinuteOfDay::parse(raw).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        assert!(!intervals_overlap(t("09:00"), t("10:00"), t("10:00"), t("11:00")));
        assert!(!intervals_overlap(t("10:00"), t("11:00"), t("09:00"), t("10:00")));
        assert!(intervals_overlap(t("09:00"), t("10:01"), t("10:00"), t("11:00")));
        assert!(intervals_overlap(t("10:15"), t("10:45"), t("10:00"), t("11:00")));
    }

    #[test]
    fn cancelled_entries_never_conflict() {
        let pro = Uuid::new_v4();
        let existing = vec![
            Appointment::new(pro, day(), t("10:00"), t("11:00")).with_status(AppointmentStatus::Cancelled),
        ];
        assert!(!is_overlapping(t("10:00"), t("11:00"), &existing));
    }

    #[test]
    fn conflict_is_scoped_to_professional_and_day() {
        let pro = Uuid::new_v4();
        let other = Uuid::new_v4();
        let existing = vec![
            Appointment::new(other, day(), t("10:00"), t("11:00")),
            Appointment::new(pro, day().succ_opt().unwrap(), t("10:00"), t("11:00")),
        ];
        assert!(first_conflict_for(pro, day(), t("10:00"), t("11:00"), &existing).is_none());
        assert!(first_conflict_for(other, day(), t("10:30"), t("11:30"), &existing).is_some());
    }

    #[test]
    fn validation_reports_colliding_id() {
        let existing = vec![Appointment::new(Uuid::new_v4(), day(), t("10:00"), t("11:00"))];
        let expected = existing[0].id;
        assert_matches!(
            validate_booking_request(t("10:30"), t("11:00"), &existing),
            Err(AvailabilityError::Conflict { appointment_id }) if appointment_id == expected
        );
        assert!(validate_booking_request(t("11:00"), t("11:30"), &existing).is_ok());
        assert_matches!(
            validate_booking_request(t("11:00"), t("11:00"), &existing),
            Err(AvailabilityError::InvalidDuration(_))
        );
    }

    #[test]
    fn override_bypasses_only_when_valid() {
        let existing = vec![Appointment::new(Uuid::new_v4(), day(), t("10:00"), t("11:00"))];
        let walk_in = OverlapOverride::new("pro-1", "walk-in", Utc::now());
        assert!(validate_with_override(t("10:00"), t("10:30"), &existing, Some(&walk_in)).is_ok());

        let anonymous = OverlapOverride::new("pro-1", "", Utc::now());
        assert_matches!(
            validate_with_override(t("10:00"), t("10:30"), &existing, Some(&anonymous)),
            Err(AvailabilityError::InvalidOverride(_))
        );
        assert_matches!(
            validate_with_override(t("10:00"), t("10:30"), &existing, None),
            Err(AvailabilityError::Conflict { .. })
        );
    }
}
