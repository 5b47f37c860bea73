//! Time-bounded cache of the loaded order set.
//!
//! Reports re-read the store at most once per TTL; a successful sync calls
//! [`OrderCache::invalidate`] so the next report sees the new orders. A load
//! that was already running when `invalidate` was called is returned to its
//! caller but never cached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::domain::errors::StoreError;
use crate::domain::order::Order;
use crate::domain::ports::OrderStore;

#[derive(Clone)]
pub struct OrderCache {
    inner: Cache<(), Arc<Vec<Order>>>,
    generation: Arc<AtomicU64>,
}

impl OrderCache {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get_or_load<S: OrderStore>(&self, store: &S) -> Result<Arc<Vec<Order>>, StoreError> {
        if let Some(orders) = self.inner.get(&()) {
            return Ok(orders);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let orders = Arc::new(store.load()?);
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Cache invalidated during load; not caching {} orders", orders.len());
            return Ok(orders);
        }
        log::debug!("Loaded {} orders into the report cache", orders.len());
        self.inner.insert((), orders.clone());
        // An invalidate may have landed between the check and the insert.
        if self.generation.load(Ordering::SeqCst) != generation {
            self.inner.invalidate(&());
        }
        Ok(orders)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.invalidate(&());
    }
}
