//! Keyed cache for catalog lookups.
//!
//! Each key owns a `OnceCell`, so concurrent first accesses to the same key
//! share a single load. Entries remember when they were fetched and are
//! dropped once older than the TTL, or when `invalidate` is called.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

type Cell<V> = Arc<OnceCell<Entry<V>>>;

pub struct TtlCache<K, V> {
    ttl: Option<Duration>,
    entries: DashMap<K, Cell<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Return the cached value for `key`, running `load` if there is none.
    ///
    /// A failed load leaves the key empty so the next caller retries.
    pub async fn get_or_try_load<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell_for(&key);
        let entry = cell
            .get_or_try_init(|| async move {
                let value = load().await?;
                Ok::<_, E>(Entry {
                    value,
                    fetched_at: Instant::now(),
                })
            })
            .await?;
        Ok(entry.value.clone())
    }

    /// Drop every entry.
    pub fn invalidate(&self) {
        self.entries.clear();
    }

    pub fn invalidate_key(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cell_for(&self, key: &K) -> Cell<V> {
        let cell = self.fetch_cell(key);
        if !self.is_expired(&cell) {
            return cell;
        }
        // Only evict the cell we looked at; another caller may already have replaced it.
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, &cell));
        self.fetch_cell(key)
    }

    fn fetch_cell(&self, key: &K) -> Cell<V> {
        Arc::clone(
            self.entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        )
    }

    fn is_expired(&self, cell: &Cell<V>) -> bool {
        match (self.ttl, cell.get()) {
            (Some(ttl), Some(entry)) => entry.fetched_at.elapsed() >= ttl,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn load_counting(counter: &AtomicUsize) -> Result<Vec<String>, String> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(vec!["employees".to_string()])
    }

    #[tokio::test]
    async fn test_loads_once_per_key() {
        let cache: TtlCache<(), Vec<String>> = TtlCache::new(None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
            assert_eq!(value, vec!["employees".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_shares_one_load() {
        let cache: Arc<TtlCache<Vec<String>, usize>> = Arc::new(TtlCache::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_load(vec!["a".to_string(), "b".to_string()], || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, String>(2)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache: TtlCache<(), u32> = TtlCache::new(None);

        let first = cache
            .get_or_try_load((), || async { Err::<u32, _>("boom".to_string()) })
            .await;
        assert_eq!(first, Err("boom".to_string()));

        let second = cache
            .get_or_try_load((), || async { Ok::<_, String>(7) })
            .await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache: TtlCache<(), Vec<String>> = TtlCache::new(Some(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);

        cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache: TtlCache<(), Vec<String>> = TtlCache::new(None);
        let calls = AtomicUsize::new(0);

        cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
        cache.invalidate();
        assert!(cache.is_empty());
        cache.get_or_try_load((), || load_counting(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
