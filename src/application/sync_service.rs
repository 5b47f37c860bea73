use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::domain::errors::SyncError;
use crate::domain::order::{newest_first, Order};
use crate::domain::ports::{OrderSource, OrderStore, PageQuery};

/// The remote listing never returns more than this many orders per page.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub per_page: u32,
    pub page_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            per_page: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NoNewOrders,
    Merged,
    FullResync,
}

#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub outcome: SyncOutcome,
    /// Orders received from the remote source in this run.
    pub fetched: usize,
    /// Orders in the store after the merge.
    pub total: usize,
    pub elapsed: Duration,
}

impl SyncSummary {
    pub fn message(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match self.outcome {
            SyncOutcome::NoNewOrders => {
                format!("No new orders found. Total: {} orders.", self.total)
            }
            SyncOutcome::Merged => format!(
                "Updated {} new orders. Total: {} orders in {:.1} seconds.",
                self.fetched, self.total, secs
            ),
            SyncOutcome::FullResync => format!(
                "Successfully updated {} orders in {:.1} seconds.",
                self.total, secs
            ),
        }
    }
}

pub struct SyncService<S, R> {
    source: S,
    store: R,
    settings: SyncSettings,
}

impl<S: OrderSource, R: OrderStore> SyncService<S, R> {
    pub fn new(source: S, store: R, settings: SyncSettings) -> Self {
        let per_page = settings.per_page.clamp(1, MAX_PAGE_SIZE);
        Self {
            source,
            store,
            settings: SyncSettings {
                per_page,
                ..settings
            },
        }
    }

    /// Pull orders from the remote source and fold them into the local store.
    ///
    /// Incremental runs only ask for orders created after the newest stored
    /// order; full runs refetch everything and replace the store. The store is
    /// written once, after every page has been fetched.
    pub async fn sync(&self, incremental: bool) -> Result<SyncSummary, SyncError> {
        let started = Instant::now();

        let existing = if incremental {
            self.store.load().unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable order store: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };
        let after = latest_order_date(&existing);

        match after {
            Some(ts) => log::info!("Fetching new orders since {}", ts.format("%Y-%m-%d %H:%M")),
            None => log::info!("Fetching all orders"),
        }

        let fetched = self.fetch_all(after, started).await?;
        if fetched.is_empty() && existing.is_empty() {
            return Err(SyncError::NoOrdersFound);
        }

        let fetched_count = fetched.len();
        let merged = merge_orders(existing, fetched);
        self.store.save(&merged)?;

        let outcome = match (incremental, fetched_count) {
            (false, _) => SyncOutcome::FullResync,
            (true, 0) => SyncOutcome::NoNewOrders,
            (true, _) => SyncOutcome::Merged,
        };
        let summary = SyncSummary {
            outcome,
            fetched: fetched_count,
            total: merged.len(),
            elapsed: started.elapsed(),
        };
        log::info!("{}", summary.message());
        Ok(summary)
    }

    async fn fetch_all(
        &self,
        after: Option<NaiveDateTime>,
        started: Instant,
    ) -> Result<Vec<Order>, SyncError> {
        let per_page = self.settings.per_page;
        let mut all = Vec::new();
        let mut total_hint = None;
        let mut page = 1;

        loop {
            let result = self
                .source
                .fetch_page(&PageQuery {
                    page,
                    per_page,
                    after,
                })
                .await?;

            if total_hint.is_none() {
                total_hint = result.total_hint;
            }
            if result.received == 0 {
                break;
            }
            all.extend(result.orders);
            log_progress(page, all.len(), total_hint, started.elapsed());

            if result.received < per_page as usize {
                break;
            }
            page += 1;
            tokio::time::sleep(self.settings.page_delay).await;
        }

        Ok(all)
    }
}

fn log_progress(page: u32, fetched: usize, total_hint: Option<u64>, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { fetched as f64 / secs } else { 0.0 };
    match total_hint {
        Some(total) if rate > 0.0 => {
            let remaining = total.saturating_sub(fetched as u64) as f64;
            log::info!(
                "Fetched {} of ~{} orders (page {}) | {:.1} orders/sec | ETA {:.1} min",
                fetched,
                total,
                page,
                rate,
                remaining / rate / 60.0
            );
        }
        _ => log::info!(
            "Fetched {} orders (page {}) | {:.1} orders/sec | elapsed {:.0}s",
            fetched,
            page,
            rate,
            secs
        ),
    }
}

/// Newest parseable creation timestamp; unparseable dates are ignored.
pub fn latest_order_date(orders: &[Order]) -> Option<NaiveDateTime> {
    orders.iter().filter_map(Order::created_at).max()
}

/// Merge by order id with `incoming` winning collisions, newest first.
pub fn merge_orders(existing: Vec<Order>, incoming: Vec<Order>) -> Vec<Order> {
    let mut by_id: HashMap<u64, Order> = existing.into_iter().map(|o| (o.id, o)).collect();
    for order in incoming {
        by_id.insert(order.id, order);
    }
    let mut merged: Vec<Order> = by_id.into_values().collect();
    merged.sort_by(newest_first);
    merged
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::errors::StoreError;
    use crate::domain::ports::OrderPage;

    fn order(id: u64, date: &str, total: &str) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "status": "completed",
            "total": total,
            "date_created": date,
        }))
        .expect("valid order")
    }

    struct ScriptedSource {
        pages: Vec<Vec<Order>>,
        fail_on_page: Option<u32>,
        queries: Mutex<Vec<PageQuery>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<Order>>) -> Self {
            Self {
                pages,
                fail_on_page: None,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OrderSource for ScriptedSource {
        async fn fetch_page(&self, query: &PageQuery) -> Result<OrderPage, SyncError> {
            self.queries.lock().unwrap().push(query.clone());
            if self.fail_on_page == Some(query.page) {
                return Err(SyncError::Connection("reset by peer".to_string()));
            }
            let orders = self
                .pages
                .get(query.page as usize - 1)
                .cloned()
                .unwrap_or_default();
            Ok(OrderPage {
                received: orders.len(),
                orders,
                total_hint: None,
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        orders: Mutex<Option<Vec<Order>>>,
        saves: Mutex<usize>,
    }

    impl MemoryStore {
        fn with(orders: Vec<Order>) -> Self {
            Self {
                orders: Mutex::new(Some(orders)),
                saves: Mutex::new(0),
            }
        }
    }

    impl OrderStore for MemoryStore {
        fn load(&self) -> Result<Vec<Order>, StoreError> {
            Ok(self.orders.lock().unwrap().clone().unwrap_or_default())
        }

        fn save(&self, orders: &[Order]) -> Result<(), StoreError> {
            *self.orders.lock().unwrap() = Some(orders.to_vec());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn settings(per_page: u32) -> SyncSettings {
        SyncSettings {
            per_page,
            page_delay: Duration::ZERO,
        }
    }

    #[test]
    fn merge_prefers_incoming_and_sorts_newest_first() {
        let existing = vec![
            order(1, "2024-01-01T00:00:00", "10"),
            order(2, "2024-02-01T00:00:00", "20"),
        ];
        let incoming = vec![
            order(2, "2024-02-01T00:00:00", "25"),
            order(3, "2024-03-01T00:00:00", "30"),
        ];
        let merged = merge_orders(existing, incoming);
        let ids: Vec<u64> = merged.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(merged[1].total.as_deref(), Some("25"));
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = vec![order(1, "2024-01-01T00:00:00", "10")];
        let batch = vec![
            order(1, "2024-01-01T00:00:00", "11"),
            order(2, "2024-01-02 08:00:00", "5"),
        ];
        let once = merge_orders(existing, batch.clone());
        let twice = merge_orders(once.clone(), batch);
        assert_eq!(once, twice);
    }

    #[test]
    fn latest_order_date_ignores_unparseable_dates() {
        let orders = vec![
            order(1, "2024-01-01T00:00:00", "10"),
            order(2, "not a date", "10"),
            order(3, "2023-12-31 23:59:59", "10"),
        ];
        let latest = latest_order_date(&orders).expect("one parseable date");
        assert_eq!(latest.to_string(), "2024-01-01 00:00:00");
        assert!(latest_order_date(&[]).is_none());
    }

    #[tokio::test]
    async fn incremental_sync_requests_orders_after_latest_date() {
        let store = MemoryStore::with(vec![
            order(1, "2023-06-01T00:00:00", "10"),
            order(2, "2024-01-01T00:00:00", "10"),
        ]);
        let service = SyncService::new(ScriptedSource::new(vec![]), store, settings(100));

        let summary = service.sync(true).await.expect("sync succeeds");

        let queries = service.source.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0].after.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Some("2024-01-01T00:00:00".to_string())
        );
        assert_eq!(summary.outcome, SyncOutcome::NoNewOrders);
        assert_eq!(summary.fetched, 0);
        assert_eq!(summary.total, 2);
        assert!(summary.message().starts_with("No new orders found"));
    }

    #[tokio::test]
    async fn paginates_until_a_short_page() {
        let pages = vec![
            vec![order(10, "2024-05-03T00:00:00", "1"), order(9, "2024-05-02T00:00:00", "1")],
            vec![order(8, "2024-05-01T00:00:00", "1"), order(7, "2024-04-30T00:00:00", "1")],
            vec![order(6, "2024-04-29T00:00:00", "1")],
        ];
        let service =
            SyncService::new(ScriptedSource::new(pages), MemoryStore::default(), settings(2));

        let summary = service.sync(true).await.expect("sync succeeds");

        let pages_requested: Vec<u32> = service
            .source
            .queries
            .lock()
            .unwrap()
            .iter()
            .map(|q| q.page)
            .collect();
        assert_eq!(pages_requested, vec![1, 2, 3]);
        assert_eq!(summary.outcome, SyncOutcome::Merged);
        assert_eq!(summary.fetched, 5);
        assert_eq!(summary.total, 5);
    }

    #[tokio::test]
    async fn stops_on_an_empty_page() {
        let pages = vec![vec![order(2, "2024-05-02T00:00:00", "1"), order(1, "2024-05-01T00:00:00", "1")]];
        let service =
            SyncService::new(ScriptedSource::new(pages), MemoryStore::default(), settings(2));

        let summary = service.sync(false).await.expect("sync succeeds");

        assert_eq!(service.source.queries.lock().unwrap().len(), 2);
        assert_eq!(summary.outcome, SyncOutcome::FullResync);
        assert_eq!(summary.total, 2);
    }

    #[tokio::test]
    async fn full_resync_ignores_stored_orders() {
        let store = MemoryStore::with(vec![order(1, "2024-01-01T00:00:00", "10")]);
        let source = ScriptedSource::new(vec![vec![order(5, "2022-01-01T00:00:00", "3")]]);
        let service = SyncService::new(source, store, settings(100));

        let summary = service.sync(false).await.expect("sync succeeds");

        assert!(service.source.queries.lock().unwrap()[0].after.is_none());
        assert_eq!(summary.total, 1);
        let stored = service.store.load().unwrap();
        assert_eq!(stored.iter().map(|o| o.id).collect::<Vec<_>>(), vec![5]);
    }

    #[tokio::test]
    async fn empty_fetch_with_empty_store_is_an_error() {
        let store = MemoryStore::default();
        let service = SyncService::new(ScriptedSource::new(vec![]), store, settings(100));

        let err = service.sync(true).await.unwrap_err();

        assert!(matches!(err, SyncError::NoOrdersFound));
        assert_eq!(*service.store.saves.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_page_leaves_store_untouched() {
        let store = MemoryStore::with(vec![order(1, "2024-01-01T00:00:00", "10")]);
        let mut source = ScriptedSource::new(vec![
            vec![order(3, "2024-02-02T00:00:00", "1"), order(2, "2024-02-01T00:00:00", "1")],
        ]);
        source.fail_on_page = Some(2);
        let service = SyncService::new(source, store, settings(2));

        let err = service.sync(true).await.unwrap_err();

        assert!(matches!(err, SyncError::Connection(_)));
        assert_eq!(*service.store.saves.lock().unwrap(), 0);
        assert_eq!(service.store.load().unwrap().len(), 1);
    }

    #[test]
    fn page_size_is_capped() {
        let service = SyncService::new(
            ScriptedSource::new(vec![]),
            MemoryStore::default(),
            settings(500),
        );
        assert_eq!(service.settings.per_page, MAX_PAGE_SIZE);
    }
}
