//! Generic time-bounded correlation table
//!
//! Entries live in per-key buckets kept in insertion order. Every entry gets
//! a unique [`WaiterId`], so removal targets exactly one instance even when
//! two entries in a bucket carry equal payloads. Ordering uses a per-table
//! sequence number taken at insert.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::time::Instant;

/// Default lifetime of a pending entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Identity of one pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(uuid::Uuid);

impl WaiterId {
    fn next() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

/// A pending entry together with its bookkeeping
#[derive(Debug, Clone)]
pub struct Pending<T> {
    pub id: WaiterId,
    pub seq: u64,
    pub created_at: Instant,
    pub persistent: bool,
    pub value: T,
}

type Buckets<K, T> = HashMap<K, Vec<Pending<T>>>;

pub struct WaiterTable<K, T> {
    inner: Arc<Mutex<Buckets<K, T>>>,
    seq: Arc<AtomicU64>,
    ttl: Duration,
}

impl<K, T> Clone for WaiterTable<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            seq: Arc::clone(&self.seq),
            ttl: self.ttl,
        }
    }
}

impl<K, T> WaiterTable<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Send + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Buckets<K, T>> {
        // A panic inside a critical section cannot leave a bucket half-edited
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_live(&self, pending: &Pending<T>, now: Instant) -> bool {
        now.saturating_duration_since(pending.created_at) < self.ttl
    }

    /// Append an entry to the bucket for `key` and schedule its expiry
    pub fn insert(&self, key: K, value: T, persistent: bool) -> WaiterId {
        let pending = Pending {
            id: WaiterId::next(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
            persistent,
            value,
        };
        let id = pending.id;
        self.lock().entry(key.clone()).or_default().push(pending);
        self.schedule_expiry(key, id);
        id
    }

    /// One-shot timer removing exactly this entry once the TTL elapses.
    /// Without a runtime the lazy check in `find`/`take` still applies.
    fn schedule_expiry(&self, key: K, id: WaiterId) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, waiter {:?} relies on lazy expiry", id);
            return;
        };
        let weak: Weak<Mutex<Buckets<K, T>>> = Arc::downgrade(&self.inner);
        let ttl = self.ttl;
        handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                let mut buckets = inner.lock().unwrap_or_else(|e| e.into_inner());
                if remove_from(&mut buckets, &key, id).is_some() {
                    tracing::debug!("Waiter {:?} expired", id);
                }
            }
        });
    }

    /// First live entry under `key` whose payload satisfies `pred`
    pub fn find<F>(&self, key: &K, pred: F) -> Option<Pending<T>>
    where
        F: Fn(&T) -> bool,
        T: Clone,
    {
        let now = Instant::now();
        let buckets = self.lock();
        buckets
            .get(key)?
            .iter()
            .find(|p| self.is_live(p, now) && pred(&p.value))
            .cloned()
    }

    /// Remove and return the first live entry under `key` satisfying `pred`
    pub fn take<F>(&self, key: &K, pred: F) -> Option<Pending<T>>
    where
        F: Fn(&T) -> bool,
    {
        let now = Instant::now();
        let mut buckets = self.lock();
        let bucket = buckets.get(key)?;
        let id = bucket
            .iter()
            .find(|p| self.is_live(p, now) && pred(&p.value))?
            .id;
        remove_from(&mut buckets, key, id)
    }

    /// Remove the entry with this id, returning it if it was still present
    pub fn claim(&self, key: &K, id: WaiterId) -> Option<Pending<T>> {
        remove_from(&mut self.lock(), key, id)
    }

    pub fn remove(&self, key: &K, id: WaiterId) -> bool {
        self.claim(key, id).is_some()
    }

    /// Put a previously claimed entry back in its original position.
    /// Its creation time is kept, so the original expiry still applies.
    pub fn restore(&self, key: K, pending: Pending<T>) {
        if !self.is_live(&pending, Instant::now()) {
            return;
        }
        let mut buckets = self.lock();
        let bucket = buckets.entry(key).or_default();
        let pos = bucket
            .iter()
            .position(|p| p.seq > pending.seq)
            .unwrap_or(bucket.len());
        bucket.insert(pos, pending);
    }

    /// Number of entries (expired or not) still stored under `key`
    pub fn len(&self, key: &K) -> usize {
        self.lock().get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total entries across all buckets
    pub fn total(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.lock();
        let mut removed = 0;
        buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|p| now.saturating_duration_since(p.created_at) < self.ttl);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }
}

fn remove_from<K, T>(buckets: &mut Buckets<K, T>, key: &K, id: WaiterId) -> Option<Pending<T>>
where
    K: Eq + Hash,
{
    let bucket = buckets.get_mut(key)?;
    let pos = bucket.iter().position(|p| p.id == id)?;
    let pending = bucket.remove(pos);
    if bucket.is_empty() {
        buckets.remove(key);
    }
    Some(pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> WaiterTable<String, &'static str> {
        WaiterTable::new(DEFAULT_TTL)
    }

    #[tokio::test]
    async fn test_find_returns_first_match_in_insertion_order() {
        let table = table();
        let key = "m1".to_string();
        table.insert(key.clone(), "a", false);
        let second = table.insert(key.clone(), "b", false);
        table.insert(key.clone(), "b", false);

        let found = table.find(&key, |v| *v == "b").unwrap();
        assert_eq!(found.id, second);
        assert_eq!(table.len(&key), 3);
    }

    #[tokio::test]
    async fn test_remove_by_identity_and_drop_empty_bucket() {
        let table = table();
        let key = "m1".to_string();
        let first = table.insert(key.clone(), "same", false);
        let second = table.insert(key.clone(), "same", false);

        assert!(table.remove(&key, second));
        assert!(!table.remove(&key, second));
        assert_eq!(table.find(&key, |_| true).unwrap().id, first);

        assert!(table.remove(&key, first));
        assert!(!table.contains_key(&key));
    }

    #[tokio::test]
    async fn test_take_is_single_shot() {
        let table = table();
        let key = "t1".to_string();
        table.insert(key.clone(), "reply", false);

        assert!(table.take(&key, |_| true).is_some());
        assert!(table.take(&key, |_| true).is_none());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_restore_keeps_position() {
        let table = table();
        let key = "m".to_string();
        let a = table.insert(key.clone(), "a", false);
        table.insert(key.clone(), "b", false);

        let claimed = table.claim(&key, a).unwrap();
        table.restore(key.clone(), claimed);
        assert_eq!(table.find(&key, |_| true).unwrap().id, a);
    }

    #[tokio::test]
    async fn test_restore_middle_entry_keeps_insertion_order() {
        for _ in 0..200 {
            let table = table();
            let key = "m".to_string();
            table.insert(key.clone(), "a", false);
            let b = table.insert(key.clone(), "b", false);
            table.insert(key.clone(), "c", false);

            let claimed = table.claim(&key, b).unwrap();
            table.restore(key.clone(), claimed);

            let order: Vec<&str> = ["a", "b", "c"]
                .iter()
                .map(|_| table.take(&key, |_| true).unwrap().value)
                .collect();
            assert_eq!(order, vec!["a", "b", "c"]);
        }
    }

    #[tokio::test]
    async fn test_clones_share_sequence() {
        let table = table();
        let other = table.clone();
        let key = "m".to_string();
        table.insert(key.clone(), "a", false);
        other.insert(key.clone(), "b", false);

        let first = table.take(&key, |_| true).unwrap();
        let second = table.take(&key, |_| true).unwrap();
        assert!(first.seq < second.seq);
        assert_eq!(first.value, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_never_matched() {
        let table = table();
        let key = "m1".to_string();
        table.insert(key.clone(), "x", false);

        tokio::time::advance(DEFAULT_TTL + Duration::from_millis(1)).await;
        assert!(table.find(&key, |_| true).is_none());
        assert!(table.take(&key, |_| true).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_timer_removes_only_its_own_entry() {
        let table = table();
        let key = "m1".to_string();
        table.insert(key.clone(), "early", false);

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        let late = table.insert(key.clone(), "late", false);

        tokio::time::sleep(Duration::from_secs(20 * 60) + Duration::from_secs(1)).await;
        assert_eq!(table.len(&key), 1);
        assert_eq!(table.find(&key, |_| true).unwrap().id, late);

        tokio::time::sleep(Duration::from_secs(10 * 60)).await;
        assert!(!table.contains_key(&key));
    }

    #[test]
    fn test_purge_without_runtime() {
        let table: WaiterTable<u32, u32> = WaiterTable::new(Duration::ZERO);
        table.insert(1, 10, false);
        table.insert(1, 11, true);
        assert_eq!(table.purge_expired(), 2);
        assert!(table.is_empty());
    }
}
