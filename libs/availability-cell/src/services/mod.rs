pub mod conflict;
pub mod schedule;
pub mod timezone;

pub use conflict::{
    first_conflict, first_conflict_for, intervals_overlap, is_overlapping,
    validate_booking_request, validate_with_override,
};
pub use schedule::{
    filter_available_slots, fits_working_hours, open_intervals, AvailabilityEngine,
    EngineConfig, RangeRequest, MAX_RANGE_DAYS,
};
pub use timezone::{professional_timezone, resolve_timezone};
