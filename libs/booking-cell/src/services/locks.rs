// libs/booking-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type LockKey = (Uuid, NaiveDate);
type LockMap = HashMap<LockKey, Arc<AsyncMutex<()>>>;

/// Serializes check-and-insert per professional and calendar day. Bookings on
/// different days or for different professionals never wait on each other.
#[derive(Default, Clone)]
pub struct SchedulingLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl SchedulingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, professional_id: Uuid, date: NaiveDate) -> DayLockGuard {
        let key = (professional_id, date);
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };

        let guard = lock.lock_owned().await;
        debug!("Acquired scheduling lock for professional {} on {}", professional_id, date);

        DayLockGuard {
            key,
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of keys with a holder or waiter.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct DayLockGuard {
    key: LockKey,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DayLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map still references the mutex: nobody holds or awaits it.
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}
