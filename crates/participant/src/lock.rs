//! Provisional per-key locks
//!
//! A participant takes a key's lock when it votes Yes in prepare and
//! releases it when the matching commit applies. There is no abort call
//! on the protocol surface, so every lock also carries an expiry equal
//! to the coordinator's protocol window; a lock whose transaction was
//! abandoned stops blocking new transactions once that window passes.

use pact_common::RequestId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Information about a held lock
#[derive(Debug, Clone)]
struct LockInfo {
    holder: RequestId,
    expires_at: Instant,
}

/// Result of a lock acquisition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockAttemptResult {
    /// Lock granted (or already held by the same request); if an expired
    /// holder was evicted to grant it, its id is reported so the caller
    /// can discard state promised under the dead lock
    Granted { evicted: Option<RequestId> },
    /// Lock held by another live transaction
    Conflict { holder: RequestId },
}

/// Per-key exclusive lock table
pub struct LockManager {
    locks: HashMap<String, LockInfo>,
}

impl LockManager {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self {
            locks: HashMap::new(),
        }
    }

    /// Try to take a key's lock for a request
    ///
    /// Re-entrant for the same request id; an expired holder is evicted
    /// and the lock granted to the new request.
    pub fn try_acquire(
        &mut self,
        request_id: RequestId,
        key: &str,
        ttl: Duration,
    ) -> LockAttemptResult {
        let now = Instant::now();

        let mut evicted = None;
        if let Some(info) = self.locks.get(key) {
            if info.holder == request_id {
                return LockAttemptResult::Granted { evicted: None };
            }
            if info.expires_at > now {
                return LockAttemptResult::Conflict {
                    holder: info.holder,
                };
            }
            tracing::warn!(
                key,
                expired_holder = %info.holder,
                new_holder = %request_id,
                "evicting expired provisional lock"
            );
            evicted = Some(info.holder);
        }

        self.locks.insert(
            key.to_string(),
            LockInfo {
                holder: request_id,
                expires_at: now + ttl,
            },
        );
        LockAttemptResult::Granted { evicted }
    }

    /// Release a key's lock if held by the given request
    pub fn release(&mut self, request_id: RequestId, key: &str) -> bool {
        match self.locks.get(key) {
            Some(info) if info.holder == request_id => {
                self.locks.remove(key);
                true
            }
            _ => false,
        }
    }

    /// True if the key's lock is currently held by the given request
    pub fn is_held_by(&self, key: &str, request_id: RequestId) -> bool {
        self.locks
            .get(key)
            .is_some_and(|info| info.holder == request_id && info.expires_at > Instant::now())
    }

    /// Number of currently held locks, expired ones included
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no locks are held
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_exclusive_per_key() {
        let mut locks = LockManager::new();
        let first = RequestId::new();
        let second = RequestId::new();

        assert_eq!(
            locks.try_acquire(first, "APPLE", TTL),
            LockAttemptResult::Granted { evicted: None }
        );
        assert_eq!(
            locks.try_acquire(second, "APPLE", TTL),
            LockAttemptResult::Conflict { holder: first }
        );

        // Disjoint keys do not conflict
        assert_eq!(
            locks.try_acquire(second, "ORANGE", TTL),
            LockAttemptResult::Granted { evicted: None }
        );
    }

    #[test]
    fn test_reentrant_for_same_request() {
        let mut locks = LockManager::new();
        let request = RequestId::new();

        assert_eq!(
            locks.try_acquire(request, "APPLE", TTL),
            LockAttemptResult::Granted { evicted: None }
        );
        assert_eq!(
            locks.try_acquire(request, "APPLE", TTL),
            LockAttemptResult::Granted { evicted: None }
        );
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_release() {
        let mut locks = LockManager::new();
        let first = RequestId::new();
        let second = RequestId::new();

        locks.try_acquire(first, "APPLE", TTL);
        assert!(locks.is_held_by("APPLE", first));

        // Only the holder can release
        assert!(!locks.release(second, "APPLE"));
        assert!(locks.release(first, "APPLE"));
        assert!(locks.is_empty());

        assert_eq!(
            locks.try_acquire(second, "APPLE", TTL),
            LockAttemptResult::Granted { evicted: None }
        );
    }

    #[test]
    fn test_expired_lock_is_evicted() {
        let mut locks = LockManager::new();
        let abandoned = RequestId::new();
        let fresh = RequestId::new();

        locks.try_acquire(abandoned, "APPLE", Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));

        assert!(!locks.is_held_by("APPLE", abandoned));
        // The stale holder is named so its promised state can be dropped
        assert_eq!(
            locks.try_acquire(fresh, "APPLE", TTL),
            LockAttemptResult::Granted {
                evicted: Some(abandoned)
            }
        );
        assert!(locks.is_held_by("APPLE", fresh));
    }
}
