pub mod booking;
pub mod lifecycle;
pub mod locks;
pub mod memory;
pub mod pricing;
pub mod store;
pub mod supabase;

pub use booking::BookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use locks::{DayLockGuard, SchedulingLocks};
pub use memory::{InMemoryAppointmentStore, InMemoryDirectory};
pub use pricing::PricingService;
pub use store::{AppointmentStore, ServiceCatalog, WorkingHoursProvider};
pub use supabase::{SupabaseAppointmentStore, SupabaseDirectory};
