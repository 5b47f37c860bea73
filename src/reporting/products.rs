use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::{BigDecimal, Zero};
use once_cell::sync::Lazy;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::Order;

/// Order totals above this are treated as group (multi-seat) purchases.
static GROUP_ORDER_THRESHOLD: Lazy<BigDecimal> = Lazy::new(|| BigDecimal::from(200));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseScale {
    Individual,
    Group,
}

impl PurchaseScale {
    /// Price-based guess at the purchase size. The catalog has no product
    /// type field to read instead.
    pub fn classify(order_total: &BigDecimal) -> Self {
        if order_total > &*GROUP_ORDER_THRESHOLD {
            PurchaseScale::Group
        } else {
            PurchaseScale::Individual
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseChannel {
    New,
    Recurring,
}

impl PurchaseChannel {
    pub fn of(order: &Order) -> Self {
        if order.is_subscription_renewal() {
            PurchaseChannel::Recurring
        } else {
            PurchaseChannel::New
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ProductBreakdown {
    /// Sum of this product's line item totals.
    #[schema(value_type = String)]
    pub revenue: BigDecimal,
    /// Orders containing the product at least once.
    pub order_count: usize,
    #[schema(value_type = String)]
    pub individual_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub group_revenue: BigDecimal,
    pub individual_count: usize,
    pub group_count: usize,
    #[schema(value_type = String)]
    pub new_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub recurring_revenue: BigDecimal,
    pub new_count: usize,
    pub recurring_count: usize,
}

/// Per-product revenue for completed orders, split by purchase scale and
/// channel. The split columns carry the whole order total for every product
/// the order contains.
pub fn aggregate_by_product(orders: &[Order]) -> BTreeMap<String, ProductBreakdown> {
    let mut products: BTreeMap<String, ProductBreakdown> = BTreeMap::new();

    for order in orders.iter().filter(|o| o.is_completed()) {
        let Some(order_total) = order.total_amount() else {
            continue;
        };
        let scale = PurchaseScale::classify(&order_total);
        let channel = PurchaseChannel::of(order);

        let mut in_order = BTreeSet::new();
        for item in &order.line_items {
            let (Some(name), Some(amount)) = (item.name.as_ref(), item.amount()) else {
                continue;
            };
            products.entry(name.clone()).or_default().revenue += amount;
            in_order.insert(name.clone());
        }

        for name in in_order {
            let entry = products.entry(name).or_default();
            entry.order_count += 1;
            match scale {
                PurchaseScale::Group => {
                    entry.group_revenue += &order_total;
                    entry.group_count += 1;
                }
                PurchaseScale::Individual => {
                    entry.individual_revenue += &order_total;
                    entry.individual_count += 1;
                }
            }
            match channel {
                PurchaseChannel::Recurring => {
                    entry.recurring_revenue += &order_total;
                    entry.recurring_count += 1;
                }
                PurchaseChannel::New => {
                    entry.new_revenue += &order_total;
                    entry.new_count += 1;
                }
            }
        }
    }

    products
}

/// Sum of `revenue` across products.
pub fn total_product_revenue(products: &BTreeMap<String, ProductBreakdown>) -> BigDecimal {
    products
        .values()
        .fold(BigDecimal::zero(), |acc, p| acc + &p.revenue)
}
