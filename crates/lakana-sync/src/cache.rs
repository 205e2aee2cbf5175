//! Time-boxed memoization of table reads.
//!
//! One slot per table. A slot holds the last successful read and the instant
//! it was taken; reads younger than the TTL are served from memory. Slots are
//! shared as `Arc<[T]>` so callers can keep a snapshot without copying.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreResult;
use crate::records::{ApplicationRecord, ChannelRecord, RoleRecord};
use crate::table::Table;

struct Entry<T> {
    rows: Arc<[T]>,
    fetched_at: Instant,
}

/// A single TTL slot.
pub struct TtlSlot<T> {
    table: Table,
    ttl: Duration,
    entry: Mutex<Option<Entry<T>>>,
}

impl<T> TtlSlot<T> {
    #[must_use]
    pub fn new(table: Table, ttl: Duration) -> Self {
        Self {
            table,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Cached rows if fresh, otherwise the result of `fetch`.
    ///
    /// The slot stays locked while fetching, so concurrent readers of a stale
    /// slot wait for one fetch instead of issuing their own. A failed fetch
    /// leaves the slot empty.
    pub fn get_or_fetch(&self, fetch: impl FnOnce() -> StoreResult<Vec<T>>) -> StoreResult<Arc<[T]>> {
        let mut entry = self.entry.lock();
        if let Some(cached) = entry.as_ref()
            && cached.fetched_at.elapsed() < self.ttl
        {
            debug!("Cache hit for {}", self.table);
            return Ok(Arc::clone(&cached.rows));
        }

        *entry = None;
        let rows: Arc<[T]> = fetch()?.into();
        debug!("Refreshed {} cache ({} rows)", self.table, rows.len());
        *entry = Some(Entry {
            rows: Arc::clone(&rows),
            fetched_at: Instant::now(),
        });
        Ok(rows)
    }

    /// Force the next read to fetch.
    pub fn invalidate(&self) {
        *self.entry.lock() = None;
    }

    #[cfg(test)]
    fn is_fresh(&self) -> bool {
        self.entry
            .lock()
            .as_ref()
            .is_some_and(|cached| cached.fetched_at.elapsed() < self.ttl)
    }
}

/// The three table caches.
pub struct CacheLayer {
    pub roles: TtlSlot<RoleRecord>,
    pub applications: TtlSlot<ApplicationRecord>,
    pub channels: TtlSlot<ChannelRecord>,
}

impl CacheLayer {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            roles: TtlSlot::new(Table::Roles, ttl),
            applications: TtlSlot::new(Table::Applications, ttl),
            channels: TtlSlot::new(Table::Channels, ttl),
        }
    }

    pub fn invalidate(&self, table: Table) {
        match table {
            Table::Roles => self.roles.invalidate(),
            Table::Applications => self.applications.invalidate(),
            Table::Channels => self.channels.invalidate(),
        }
    }

    pub fn invalidate_all(&self) {
        for table in Table::ALL {
            self.invalidate(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_fresh_slot_skips_fetch() {
        let slot = TtlSlot::new(Table::Roles, Duration::from_secs(60));
        let fetches = Cell::new(0);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            Ok(vec![1, 2, 3])
        };

        assert_eq!(&*slot.get_or_fetch(fetch).unwrap(), &[1, 2, 3]);
        assert_eq!(&*slot.get_or_fetch(fetch).unwrap(), &[1, 2, 3]);
        assert_eq!(fetches.get(), 1);

        slot.invalidate();
        assert!(!slot.is_fresh());
        slot.get_or_fetch(fetch).unwrap();
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_zero_ttl_always_fetches() {
        let slot = TtlSlot::new(Table::Channels, Duration::ZERO);
        slot.get_or_fetch(|| Ok(vec!["a"])).unwrap();
        let rows = slot.get_or_fetch(|| Ok(vec!["b"])).unwrap();
        assert_eq!(&*rows, &["b"]);
    }

    #[test]
    fn test_failed_fetch_empties_slot() {
        let slot = TtlSlot::new(Table::Applications, Duration::ZERO);
        slot.get_or_fetch(|| Ok(vec![1])).unwrap();
        let err = slot
            .get_or_fetch(|| Err(StoreError::Unavailable("down".into())))
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!slot.is_fresh());
    }

    #[test]
    fn test_invalidate_all_clears_every_slot() {
        let cache = CacheLayer::new(Duration::from_secs(60));
        cache.roles.get_or_fetch(|| Ok(Vec::new())).unwrap();
        cache.channels.get_or_fetch(|| Ok(Vec::new())).unwrap();
        assert!(cache.roles.is_fresh());

        cache.invalidate_all();
        assert!(!cache.roles.is_fresh());
        assert!(!cache.channels.is_fresh());
    }
}
