use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use availability_cell::{
    intervals_overlap, Appointment, AppointmentKind, AppointmentStatus, AvailabilityError,
    MinuteOfDay, OverlapOverride, Professional, RangeRequest, WeeklySchedule, WorkingHours,
};
use booking_cell::models::{BlockRequest, BookingRequest, Service};
use booking_cell::services::{
    AppointmentStore, BookingService, InMemoryAppointmentStore, InMemoryDirectory, WorkingHoursProvider,
};
use booking_cell::{BookingError, StoreError};
use shared_config::AppConfig;

// ==============================================================================
// FIXTURES
// ==============================================================================

fn at(hour: u16, minute: u16) -> MinuteOfDay {
    MinuteOfDay::from_hm(hour, minute).unwrap()
}

/// A Monday.
fn salon_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
}

fn long_before() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

struct Salon {
    booking: Arc<BookingService>,
    directory: Arc<InMemoryDirectory>,
    professional_id: Uuid,
    cut: Uuid,
    color: Uuid,
    brush: Uuid,
}

impl Salon {
    fn request(&self, start: MinuteOfDay, service_ids: Vec<Uuid>) -> BookingRequest {
        BookingRequest {
            professional_id: self.professional_id,
            date: salon_day(),
            start_time: start,
            service_ids,
            client_name: Some("Camille".to_string()),
        }
    }

    fn block(&self, start: MinuteOfDay, end: MinuteOfDay, overlap_override: Option<OverlapOverride>) -> BlockRequest {
        BlockRequest {
            date: salon_day(),
            start_time: start,
            end_time: end,
            label: Some("Walk-in".to_string()),
            overlap_override,
        }
    }
}

fn service(name: &str, duration_minutes: i32, price_cents: i64, requires_deposit: bool) -> Service {
    Service {
        id: Uuid::new_v4(),
        name: name.to_string(),
        duration_minutes,
        price_cents,
        requires_deposit,
    }
}

async fn salon_with(store: Arc<dyn AppointmentStore>) -> Salon {
    let directory = Arc::new(InMemoryDirectory::new());
    let professional_id = Uuid::new_v4();

    let workday = WorkingHours::open(at(9, 0), at(18, 0)).with_break(at(12, 0), at(13, 0));
    let mut schedule = WeeklySchedule::new();
    for weekday in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri, Weekday::Sat] {
        schedule.set(weekday, workday.clone());
    }

    directory.add_professional(
        Professional {
            id: professional_id,
            display_name: "Inès".to_string(),
            timezone: Some("Europe/Paris".to_string()),
        },
        schedule,
    ).await;

    let cut = service("Cut", 30, 2500, false);
    let color = service("Color", 90, 6000, true);
    let brush = service("Brushing", 45, 3000, false);
    let ids = (cut.id, color.id, brush.id);
    for s in [cut, color, brush] {
        directory.add_service(s).await;
    }

    let booking = BookingService::new(&AppConfig::default(), directory.clone(), directory.clone(), store);

    Salon {
        booking: Arc::new(booking),
        directory,
        professional_id,
        cut: ids.0,
        color: ids.1,
        brush: ids.2,
    }
}

async fn salon() -> Salon {
    salon_with(Arc::new(InMemoryAppointmentStore::new())).await
}

/// Lets a competitor commit between the service's check and its insert.
struct RacingStore {
    inner: InMemoryAppointmentStore,
}

#[async_trait]
impl AppointmentStore for RacingStore {
    async fn appointments_for_day(&self, professional_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.inner.appointments_for_day(professional_id, date).await
    }

    async fn appointments_in_range(&self, professional_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.inner.appointments_in_range(professional_id, from, to).await
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.get(appointment_id).await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let competitor = Appointment::new(
            appointment.professional_id,
            appointment.date,
            appointment.start_time,
            appointment.end_time,
        );
        self.inner.insert(competitor).await?;
        self.inner.insert(appointment).await
    }

    async fn update_status(&self, appointment_id: Uuid, expected: AppointmentStatus, status: AppointmentStatus) -> Result<Appointment, StoreError> {
        self.inner.update_status(appointment_id, expected, status).await
    }
}

/// Serves a frozen copy of an appointment from `get`, the way a lagging
/// replica would, while writes go to the real store.
struct LaggingReadStore {
    inner: InMemoryAppointmentStore,
    frozen: Mutex<Option<Appointment>>,
}

impl LaggingReadStore {
    fn new() -> Self {
        Self { inner: InMemoryAppointmentStore::new(), frozen: Mutex::new(None) }
    }

    fn freeze(&self, appointment: Appointment) {
        *self.frozen.lock().unwrap() = Some(appointment);
    }
}

#[async_trait]
impl AppointmentStore for LaggingReadStore {
    async fn appointments_for_day(&self, professional_id: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.inner.appointments_for_day(professional_id, date).await
    }

    async fn appointments_in_range(&self, professional_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        self.inner.appointments_in_range(professional_id, from, to).await
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let frozen = self.frozen.lock().unwrap().clone();
        match frozen {
            Some(appointment) if appointment.id == appointment_id => Ok(Some(appointment)),
            _ => self.inner.get(appointment_id).await,
        }
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        self.inner.insert(appointment).await
    }

    async fn update_status(&self, appointment_id: Uuid, expected: AppointmentStatus, status: AppointmentStatus) -> Result<Appointment, StoreError> {
        self.inner.update_status(appointment_id, expected, status).await
    }
}

fn assert_no_active_overlap(planning: &[Appointment]) {
    let active: Vec<_> = planning.iter().filter(|a| a.status.occupies_time()).collect();
    for (i, a) in active.iter().enumerate() {
        for b in active.iter().skip(i + 1) {
            assert!(!intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time),
                    "{}-{} {} overlaps {}-{} {}", a.start_time, a.end_time, a.status, b.start_time, b.end_time, b.status);
        }
    }
}

// ==============================================================================
// BOOKING AND AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn booked_slot_is_disabled_for_later_readers() {
    let salon = salon().await;

    assert_ok!(salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), long_before()).await);

    let day = assert_ok!(salon.booking.day_availability(salon.professional_id, salon_day(), 30, long_before()).await);
    let slot = |time: MinuteOfDay| day.slots.iter().find(|s| s.time == time).map(|s| s.available);

    assert_eq!(slot(at(9, 30)), Some(true));
    assert_eq!(slot(at(10, 0)), Some(false));
    assert_eq!(slot(at(10, 30)), Some(true));
}

#[tokio::test]
async fn overlapping_request_reports_the_blocking_appointment() {
    let salon = salon().await;

    let first = assert_ok!(salon.booking.book(salon.request(at(10, 0), vec![salon.color]), long_before()).await);
    assert_eq!(first.appointment.end_time, at(11, 30));

    let err = assert_err!(salon.booking.book(salon.request(at(11, 0), vec![salon.cut]), long_before()).await);
    assert_matches!(
        err,
        BookingError::Availability(AvailabilityError::Conflict { appointment_id }) if appointment_id == first.appointment.id
    );
    assert!(err.is_slot_taken());

    // Touching at 11:30 is not an overlap
    assert_ok!(salon.booking.book(salon.request(at(11, 30), vec![salon.cut]), long_before()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_slot_have_exactly_one_winner() {
    let salon = salon().await;

    let attempts = (0..12).map(|_| {
        let booking = Arc::clone(&salon.booking);
        let request = salon.request(at(10, 0), vec![salon.cut]);
        tokio::spawn(async move { booking.book(request, long_before()).await })
    });

    let results: Vec<_> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("booking task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    // The day lock serializes the re-check, so every loser sees the winner's entry
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_matches!(result, BookingError::Availability(AvailabilityError::Conflict { .. }));
    }

    let planning = salon.booking.planning(salon.professional_id, salon_day()).await.unwrap();
    assert_eq!(planning.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_bookings_never_overlap_once_stored() {
    let salon = salon().await;
    let starts = [at(9, 0), at(9, 30), at(10, 0), at(10, 30), at(14, 0), at(14, 30), at(15, 0)];

    let attempts = starts.iter().map(|start| {
        let booking = Arc::clone(&salon.booking);
        let request = salon.request(*start, vec![salon.color]);
        tokio::spawn(async move { booking.book(request, long_before()).await })
    });
    futures::future::join_all(attempts).await;

    let planning = salon.booking.planning(salon.professional_id, salon_day()).await.unwrap();
    assert!(!planning.is_empty());
    for (i, a) in planning.iter().enumerate() {
        for b in planning.iter().skip(i + 1) {
            assert!(!intervals_overlap(a.start_time, a.end_time, b.start_time, b.end_time),
                    "{}-{} overlaps {}-{}", a.start_time, a.end_time, b.start_time, b.end_time);
        }
    }
}

#[tokio::test]
async fn store_rejection_after_a_passing_check_is_a_stale_read() {
    let salon = salon_with(Arc::new(RacingStore { inner: InMemoryAppointmentStore::new() })).await;

    let err = assert_err!(salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), long_before()).await);

    assert_matches!(err, BookingError::Availability(AvailabilityError::StaleRead { appointment_id: Some(_) }));
    assert!(err.is_slot_taken());
}

#[tokio::test]
async fn bookings_must_fit_an_open_window() {
    let salon = salon().await;

    // Inside the lunch break
    let err = assert_err!(salon.booking.book(salon.request(at(12, 30), vec![salon.cut]), long_before()).await);
    assert_matches!(err, BookingError::OutsideWorkingHours(_));

    // Runs across the break
    let err = assert_err!(salon.booking.book(salon.request(at(11, 0), vec![salon.color]), long_before()).await);
    assert_matches!(err, BookingError::OutsideWorkingHours(_));

    // Runs past closing
    let err = assert_err!(salon.booking.book(salon.request(at(17, 0), vec![salon.color]), long_before()).await);
    assert_matches!(err, BookingError::OutsideWorkingHours(_));

    // Sunday has no hours
    let mut sunday = salon.request(at(10, 0), vec![salon.cut]);
    sunday.date = NaiveDate::from_ymd_opt(2030, 3, 10).unwrap();
    let err = assert_err!(salon.booking.book(sunday, long_before()).await);
    assert_matches!(err, BookingError::OutsideWorkingHours(_));
}

#[tokio::test]
async fn past_start_times_are_refused_in_salon_time() {
    let salon = salon().await;
    // 10:30 in Paris (UTC+1 before the March switch)
    let now = Utc.with_ymd_and_hms(2030, 3, 4, 9, 30, 0).unwrap();

    let err = assert_err!(salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), now).await);
    assert_matches!(err, BookingError::InPast);

    let err = assert_err!(salon.booking.book(salon.request(at(10, 30), vec![salon.cut]), now).await);
    assert_matches!(err, BookingError::InPast);

    assert_ok!(salon.booking.book(salon.request(at(11, 0), vec![salon.cut]), now).await);
}

#[tokio::test]
async fn deposit_services_start_pending() {
    let salon = salon().await;

    let color = assert_ok!(salon.booking.book(salon.request(at(9, 0), vec![salon.color]), long_before()).await);
    assert_eq!(color.appointment.status, AppointmentStatus::Pending);
    assert_eq!(color.quote.deposit_cents, 1800);

    let cut = assert_ok!(salon.booking.book(salon.request(at(14, 0), vec![salon.cut]), long_before()).await);
    assert_eq!(cut.appointment.status, AppointmentStatus::Confirmed);
    assert_eq!(cut.quote.deposit_cents, 0);
    assert_eq!(cut.appointment.service_ids, vec![salon.cut]);
}

#[tokio::test]
async fn multi_service_selection_books_the_summed_duration() {
    let salon = salon().await;
    let selection = vec![salon.cut, salon.brush];

    let duration = salon.booking.total_duration(&selection).await.unwrap();
    assert_eq!(duration, 75);

    let day = salon.booking.day_availability(salon.professional_id, salon_day(), duration, long_before()).await.unwrap();
    let available = day.available_times();
    assert!(available.contains(&at(10, 30)));
    assert!(!available.contains(&at(11, 0)));

    let confirmation = salon.booking.book(salon.request(at(10, 30), selection), long_before()).await.unwrap();
    assert_eq!(confirmation.appointment.end_time, at(11, 45));
    assert_eq!(confirmation.quote.total_price_cents, 5500);
}

#[tokio::test]
async fn unknown_references_are_rejected() {
    let salon = salon().await;

    let err = assert_err!(salon.booking.book(salon.request(at(10, 0), vec![Uuid::new_v4()]), long_before()).await);
    assert_matches!(err, BookingError::ValidationError(_));

    let mut request = salon.request(at(10, 0), vec![salon.cut]);
    request.professional_id = Uuid::new_v4();
    let err = assert_err!(salon.booking.book(request, long_before()).await);
    assert_matches!(err, BookingError::ProfessionalNotFound(_));

    let err = assert_err!(salon.booking.book(salon.request(at(10, 0), vec![]), long_before()).await);
    assert_matches!(err, BookingError::Availability(AvailabilityError::InvalidDuration(_)));
}

#[tokio::test]
async fn week_grid_reflects_bookings_and_closed_days() {
    let salon = salon().await;
    salon.booking.book(salon.request(at(9, 0), vec![salon.cut]), long_before()).await.unwrap();

    let grid = salon.booking.range_availability(
        RangeRequest {
            professional_id: salon.professional_id,
            from: salon_day(),
            days: 7,
            service_duration_minutes: 30,
        },
        long_before(),
    ).await.unwrap();

    assert_eq!(grid.len(), 7);
    assert!(!grid[0].available_times().contains(&at(9, 0)));
    assert!(grid[1].available_times().contains(&at(9, 0)));
    assert!(grid[6].slots.is_empty());

    let err = assert_err!(salon.booking.range_availability(
        RangeRequest {
            professional_id: salon.professional_id,
            from: salon_day(),
            days: 0,
            service_duration_minutes: 30,
        },
        long_before(),
    ).await);
    assert_matches!(err, BookingError::Availability(AvailabilityError::InvalidRange(_)));
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn cancellation_frees_the_slot_for_good() {
    let salon = salon().await;

    let first = salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), long_before()).await.unwrap();
    let cancelled = salon.booking.update_status(first.appointment.id, AppointmentStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert_ok!(salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), long_before()).await);

    let err = assert_err!(salon.booking.update_status(first.appointment.id, AppointmentStatus::Confirmed).await);
    assert_matches!(err, BookingError::InvalidStatusTransition {
        from: AppointmentStatus::Cancelled,
        to: AppointmentStatus::Confirmed,
    });

    // Both entries stay on the planning
    let planning = salon.booking.planning(salon.professional_id, salon_day()).await.unwrap();
    assert_eq!(planning.len(), 2);
}

#[tokio::test]
async fn status_write_from_a_stale_read_cannot_revive_a_cancelled_booking() {
    let store = Arc::new(LaggingReadStore::new());
    let salon = salon_with(store.clone()).await;

    let first = salon.booking.book(salon.request(at(9, 0), vec![salon.color]), long_before()).await.unwrap();
    assert_eq!(first.appointment.status, AppointmentStatus::Pending);
    store.freeze(first.appointment.clone());

    assert_ok!(salon.booking.update_status(first.appointment.id, AppointmentStatus::Cancelled).await);
    assert_ok!(salon.booking.book(salon.request(at(9, 0), vec![salon.cut]), long_before()).await);

    // The reader still sees `pending`, so confirming looks like a valid move
    let err = assert_err!(salon.booking.update_status(first.appointment.id, AppointmentStatus::Confirmed).await);
    assert_matches!(
        err,
        BookingError::Store(StoreError::StatusChanged { appointment_id, expected: AppointmentStatus::Pending })
            if appointment_id == first.appointment.id
    );

    let planning = salon.booking.planning(salon.professional_id, salon_day()).await.unwrap();
    assert_eq!(planning.iter().filter(|a| a.status.occupies_time()).count(), 1);
    assert_no_active_overlap(&planning);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_status_changes_and_rebooking_keep_the_calendar_clean() {
    for _ in 0..20 {
        let salon = salon().await;
        let pending = salon.booking.book(salon.request(at(9, 0), vec![salon.color]), long_before()).await.unwrap();
        let id = pending.appointment.id;

        let cancel = {
            let booking = Arc::clone(&salon.booking);
            tokio::spawn(async move { booking.update_status(id, AppointmentStatus::Cancelled).await })
        };
        let confirm = {
            let booking = Arc::clone(&salon.booking);
            tokio::spawn(async move { booking.update_status(id, AppointmentStatus::Confirmed).await })
        };
        let rebook = {
            let booking = Arc::clone(&salon.booking);
            let request = salon.request(at(9, 0), vec![salon.cut]);
            tokio::spawn(async move { booking.book(request, long_before()).await })
        };

        let (cancel, confirm, rebook) = tokio::join!(cancel, confirm, rebook);
        let cancel = cancel.expect("cancel task panicked");
        let confirm = confirm.expect("confirm task panicked");
        let _ = rebook.expect("booking task panicked");

        assert!(cancel.is_ok() || confirm.is_ok());
        if let Err(err) = &confirm {
            assert_matches!(err, BookingError::InvalidStatusTransition { from: AppointmentStatus::Cancelled, .. });
        }

        let planning = salon.booking.planning(salon.professional_id, salon_day()).await.unwrap();
        assert_no_active_overlap(&planning);
    }
}

#[tokio::test]
async fn status_follows_the_salon_lifecycle() {
    let salon = salon().await;
    let booked = salon.booking.book(salon.request(at(9, 0), vec![salon.color]), long_before()).await.unwrap();
    let id = booked.appointment.id;

    assert_ok!(salon.booking.update_status(id, AppointmentStatus::Confirmed).await);
    let done = assert_ok!(salon.booking.update_status(id, AppointmentStatus::Completed).await);
    assert_eq!(done.status, AppointmentStatus::Completed);

    assert_matches!(
        salon.booking.update_status(id, AppointmentStatus::NoShow).await,
        Err(BookingError::InvalidStatusTransition { .. })
    );
    assert_matches!(
        salon.booking.update_status(Uuid::new_v4(), AppointmentStatus::Cancelled).await,
        Err(BookingError::AppointmentNotFound(_))
    );
}

// ==============================================================================
// MANUAL BLOCKS
// ==============================================================================

#[tokio::test]
async fn blocks_need_an_override_to_overlap() {
    let salon = salon().await;
    let client = salon.booking.book(salon.request(at(10, 0), vec![salon.cut]), long_before()).await.unwrap();

    let err = assert_err!(salon.booking.create_block(
        salon.professional_id,
        salon.block(at(10, 0), at(11, 0), None),
        long_before(),
    ).await);
    assert_matches!(
        err,
        BookingError::Availability(AvailabilityError::Conflict { appointment_id }) if appointment_id == client.appointment.id
    );

    let forced = OverlapOverride::new("owner@salon.fr", "Regular client squeezed in", long_before());
    let block = assert_ok!(salon.booking.create_block(
        salon.professional_id,
        salon.block(at(10, 0), at(11, 0), Some(forced.clone())),
        long_before(),
    ).await);

    assert_eq!(block.kind, AppointmentKind::ManualBlock);
    assert_eq!(block.overlap_override, Some(forced));

    // The forced block still holds its time against clients
    let err = assert_err!(salon.booking.book(salon.request(at(10, 30), vec![salon.cut]), long_before()).await);
    assert_matches!(err, BookingError::Availability(AvailabilityError::Conflict { appointment_id }) if appointment_id == block.id);
}

#[tokio::test]
async fn overrides_must_name_author_and_reason() {
    let salon = salon().await;

    let err = assert_err!(salon.booking.create_block(
        salon.professional_id,
        salon.block(at(10, 0), at(11, 0), Some(OverlapOverride::new("owner", "  ", long_before()))),
        long_before(),
    ).await);
    assert_matches!(err, BookingError::Availability(AvailabilityError::InvalidOverride(_)));

    let err = assert_err!(salon.booking.create_block(
        salon.professional_id,
        salon.block(at(11, 0), at(10, 0), None),
        long_before(),
    ).await);
    assert_matches!(err, BookingError::ValidationError(_));
}

// ==============================================================================
// WORKING HOURS
// ==============================================================================

#[tokio::test]
async fn working_hours_updates_are_validated_and_applied() {
    let salon = salon().await;

    let broken = WorkingHours::open(at(18, 0), at(9, 0));
    let err = assert_err!(salon.booking.set_working_hours(salon.professional_id, Weekday::Sun, broken).await);
    assert_matches!(err, BookingError::Availability(AvailabilityError::InvalidWorkingHours(_)));

    let schedule = salon.booking
        .set_working_hours(salon.professional_id, Weekday::Sun, WorkingHours::open(at(10, 0), at(12, 0)))
        .await
        .unwrap();
    assert!(schedule.hours_for_weekday(Weekday::Sun).is_some());

    let sunday = NaiveDate::from_ymd_opt(2030, 3, 10).unwrap();
    let day = salon.booking.day_availability(salon.professional_id, sunday, 60, long_before()).await.unwrap();
    assert_eq!(day.available_times(), vec![at(10, 0), at(10, 30), at(11, 0)]);

    let stored = salon.directory.weekly_schedule(salon.professional_id).await.unwrap();
    assert_eq!(stored.days.len(), 7);
}
