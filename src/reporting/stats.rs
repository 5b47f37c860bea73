use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::{Order, OrderStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct OrderStats {
    /// Orders with a numeric total, whatever their status.
    pub total_orders: usize,
    pub completed_orders: usize,
    pub refunded_orders: usize,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub refunded_amount: BigDecimal,
    #[schema(value_type = String)]
    pub avg_order_value: BigDecimal,
    pub customer_count: usize,
    pub status_breakdown: BTreeMap<String, usize>,
    #[schema(value_type = Object)]
    pub revenue_by_product: BTreeMap<String, BigDecimal>,
}

/// Headline figures for a set of orders. Orders without a numeric total are
/// ignored throughout; revenue counts completed orders only.
pub fn calculate_stats(orders: &[Order]) -> OrderStats {
    let valid: Vec<(&Order, BigDecimal)> = orders
        .iter()
        .filter_map(|o| o.total_amount().map(|total| (o, total)))
        .collect();

    let mut stats = OrderStats {
        total_orders: valid.len(),
        ..OrderStats::default()
    };
    let mut customers = BTreeSet::new();

    for (order, total) in &valid {
        customers.insert(order.customer_id);
        *stats
            .status_breakdown
            .entry(order.status.as_str().to_string())
            .or_insert(0) += 1;

        match order.status {
            OrderStatus::Completed => {
                stats.completed_orders += 1;
                stats.total_revenue += total;
                for item in &order.line_items {
                    if let (Some(name), Some(amount)) = (item.name.as_ref(), item.amount()) {
                        *stats
                            .revenue_by_product
                            .entry(name.clone())
                            .or_insert_with(BigDecimal::zero) += amount;
                    }
                }
            }
            OrderStatus::Refunded => {
                stats.refunded_orders += 1;
                stats.refunded_amount += total;
            }
            _ => {}
        }
    }

    stats.customer_count = customers.len();
    if stats.completed_orders > 0 {
        stats.avg_order_value =
            (stats.total_revenue.clone() / BigDecimal::from(stats.completed_orders as u64)).round(2);
    }
    stats
}
