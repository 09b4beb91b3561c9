//! Short-lived profile-role cache.
//!
//! DESIGN
//! ======
//! `HashMap<Uuid, (role, fetched_at)>` behind a `std::sync::Mutex`; the lock
//! is never held across an `.await`. Entries older than the TTL are treated
//! as absent and pruned on read. A zero TTL disables caching entirely.
//!
//! Invalidation is explicit: the navigator clears the cache on sign-in,
//! sign-out, and full reloads, so a role change is picked up at the next
//! session transition or after at most one TTL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

pub const DEFAULT_ROLE_CACHE_TTL_SECS: u64 = 30;

struct CachedRole {
    role: String,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct RoleCache {
    inner: Arc<Mutex<HashMap<Uuid, CachedRole>>>,
    ttl: Duration,
}

impl RoleCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), ttl }
    }

    /// Cached role for `user_id` if it is still fresh.
    #[must_use]
    pub fn get(&self, user_id: Uuid) -> Option<String> {
        self.get_at(user_id, Instant::now())
    }

    fn get_at(&self, user_id: Uuid, now: Instant) -> Option<String> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let fresh = inner
            .get(&user_id)
            .is_some_and(|entry| now.duration_since(entry.fetched_at) < self.ttl);
        if fresh {
            inner.get(&user_id).map(|entry| entry.role.clone())
        } else {
            inner.remove(&user_id);
            None
        }
    }

    /// Record a successfully fetched role.
    pub fn insert(&self, user_id: Uuid, role: &str) {
        self.insert_at(user_id, role, Instant::now());
    }

    fn insert_at(&self, user_id: Uuid, role: &str, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.insert(user_id, CachedRole { role: role.to_owned(), fetched_at: now });
    }

    /// Drop every cached role.
    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RoleCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_ROLE_CACHE_TTL_SECS))
    }
}

#[cfg(test)]
#[path = "role_cache_test.rs"]
mod tests;
