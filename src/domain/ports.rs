use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::errors::{StoreError, SyncError};
use super::order::Order;

/// One page request against the remote order listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
    pub after: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    /// Records on the wire, including any that failed to decode.
    pub received: usize,
    /// Total matching orders, when the server advertises it.
    pub total_hint: Option<u64>,
}

#[async_trait]
pub trait OrderSource: Send + Sync + 'static {
    async fn fetch_page(&self, query: &PageQuery) -> Result<OrderPage, SyncError>;
}

pub trait OrderStore: Send + Sync + 'static {
    /// Load every stored order. A missing store is empty, not an error.
    fn load(&self) -> Result<Vec<Order>, StoreError>;
    /// Replace the stored set. Either the whole list is written or nothing is.
    fn save(&self, orders: &[Order]) -> Result<(), StoreError>;
}
