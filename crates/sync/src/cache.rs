use crate::clock::Clock;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use core::num::NonZeroI64;
use dashmap::DashMap;
use std::sync::Arc;

/// Key for a cached class roster.
pub fn students_key(class_id: NonZeroI64) -> String {
    format!("students:{class_id}")
}

/// Key for the cached assignments of one class day.
pub fn attendance_key(class_id: NonZeroI64, date: NaiveDate) -> String {
    format!("attendance:{class_id}:{date}")
}

/// Key for a teacher's cached question pool.
pub fn questions_key(teacher_id: NonZeroI64) -> String {
    format!("questions:{teacher_id}")
}

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Expiring memo for fetched collaborator data (rosters, question pools,
/// class-day assignments). Expiry is checked on read, so no background
/// timer is required for correctness; [`cleanup`] exists only as memory
/// hygiene for long-lived processes. There is deliberately no capacity
/// bound and no eviction order: keys are few and short-lived.
///
/// [`cleanup`]: Cache::cleanup
pub struct Cache<V> {
    clock: Arc<dyn Clock>,
    entries: DashMap<Box<str>, Entry<V>>,
}

impl<V: Clone> Cache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, entries: DashMap::new() }
    }

    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    /// Read with expiry check: an entry past its deadline is removed and
    /// reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Drop every entry whose key starts with `prefix`, expired or not.
    pub fn invalidate(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Evict everything already past its deadline.
    pub fn cleanup(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| now <= entry.expires_at);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
