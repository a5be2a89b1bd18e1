//! Bounded in-memory cache of structured scrape results.

use crate::amazon::markets::Market;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, trace};

/// Kind of lookup a cached result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Search { page: u32 },
    Detail,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: Operation,
    pub market: Market,
    pub query: String,
}

impl CacheKey {
    pub fn search(market: Market, query: &str, page: u32) -> Self {
        Self {
            operation: Operation::Search { page },
            market,
            query: query.trim().to_lowercase(),
        }
    }

    pub fn detail(market: Market, asin: &str) -> Self {
        Self { operation: Operation::Detail, market, query: asin.to_string() }
    }
}

struct Entries<V> {
    map: HashMap<CacheKey, V>,
    order: VecDeque<CacheKey>,
}

/// Insertion-ordered cache that drops its oldest entries when full.
///
/// When an insert pushes the size over `capacity`, the oldest `evict_batch`
/// entries are removed in one go.
pub struct ResultCache<V> {
    entries: Mutex<Entries<V>>,
    capacity: usize,
    evict_batch: usize,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self::with_eviction(capacity, (capacity / 10).max(1))
    }

    pub fn with_eviction(capacity: usize, evict_batch: usize) -> Self {
        Self {
            entries: Mutex::new(Entries { map: HashMap::new(), order: VecDeque::new() }),
            capacity,
            evict_batch: evict_batch.max(1),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let hit = entries.map.get(key).cloned();
        if hit.is_some() {
            trace!("Cache hit: {:?}", key);
        }
        hit
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.map.insert(key.clone(), value).is_none() {
            entries.order.push_back(key);
        }

        if entries.map.len() > self.capacity {
            let mut evicted = 0;
            while evicted < self.evict_batch {
                let Some(oldest) = entries.order.pop_front() else { break };
                entries.map.remove(&oldest);
                evicted += 1;
            }
            debug!("Cache over capacity, evicted {} oldest entries", evicted);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
