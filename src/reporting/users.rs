use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::{BigDecimal, Zero};
use chrono::Datelike;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::{parse_timestamp, Order};

use super::exclusions::ExclusionList;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserSummary {
    pub customer_id: u64,
    pub name: String,
    pub email: String,
    pub first_order_date: Option<String>,
    pub last_order_date: Option<String>,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    pub order_count: usize,
    pub subscription_orders: usize,
    pub new_orders: usize,
    #[schema(value_type = Vec<String>)]
    pub products_purchased: BTreeSet<String>,
    /// Whole months between the first and last order.
    pub subscription_months: u32,
}

impl UserSummary {
    fn open(order: &Order) -> Self {
        Self {
            customer_id: order.customer_id,
            name: order.customer_name(),
            email: order.billing.email.clone(),
            first_order_date: order.date_created.clone(),
            last_order_date: order.date_created.clone(),
            total_revenue: BigDecimal::zero(),
            order_count: 0,
            subscription_orders: 0,
            new_orders: 0,
            products_purchased: BTreeSet::new(),
            subscription_months: 0,
        }
    }

    fn record(&mut self, order: &Order, total: BigDecimal, exclusions: &ExclusionList) {
        self.total_revenue += total;
        self.order_count += 1;
        if order.is_subscription_renewal() {
            self.subscription_orders += 1;
        } else {
            self.new_orders += 1;
        }

        if let Some(date) = order.date_created.as_ref() {
            if self.first_order_date.as_ref().map_or(true, |first| date < first) {
                self.first_order_date = Some(date.clone());
            }
            if self.last_order_date.as_ref().map_or(true, |last| date > last) {
                self.last_order_date = Some(date.clone());
            }
        }

        for name in order.product_names() {
            if !exclusions.is_excluded(name) {
                self.products_purchased.insert(name.trim().to_string());
            }
        }
    }
}

/// Whole calendar months from `first` to `last`; zero when either date does
/// not parse or the order is reversed.
pub fn months_between(first: &str, last: &str) -> u32 {
    match (parse_timestamp(first), parse_timestamp(last)) {
        (Some(first), Some(last)) => {
            let months = (last.year() - first.year()) * 12 + last.month() as i32
                - first.month() as i32;
            months.max(0) as u32
        }
        _ => 0,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct UsersReport {
    /// One entry per customer, ordered by customer id.
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UsersOverview {
    pub total_users: usize,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub avg_lifetime_value: BigDecimal,
    pub avg_orders_per_user: f64,
    pub longest_subscriptions: Vec<UserSummary>,
    pub highest_lifetime_value: Vec<UserSummary>,
}

impl UsersReport {
    pub fn total_revenue(&self) -> BigDecimal {
        self.users
            .iter()
            .fold(BigDecimal::zero(), |acc, u| acc + &u.total_revenue)
    }

    pub fn longest_subscriptions(&self, limit: usize) -> Vec<UserSummary> {
        let mut users = self.users.clone();
        users.sort_by(|a, b| b.subscription_months.cmp(&a.subscription_months));
        users.truncate(limit);
        users
    }

    pub fn highest_lifetime_value(&self, limit: usize) -> Vec<UserSummary> {
        let mut users = self.users.clone();
        users.sort_by(|a, b| b.total_revenue.cmp(&a.total_revenue));
        users.truncate(limit);
        users
    }

    pub fn overview(&self, limit: usize) -> UsersOverview {
        let total_users = self.users.len();
        let total_revenue = self.total_revenue();
        let (avg_lifetime_value, avg_orders_per_user) = if total_users > 0 {
            let orders: usize = self.users.iter().map(|u| u.order_count).sum();
            (
                (total_revenue.clone() / BigDecimal::from(total_users as u64)).round(2),
                orders as f64 / total_users as f64,
            )
        } else {
            (BigDecimal::zero(), 0.0)
        };
        UsersOverview {
            total_users,
            total_revenue,
            avg_lifetime_value,
            avg_orders_per_user,
            longest_subscriptions: self.longest_subscriptions(limit),
            highest_lifetime_value: self.highest_lifetime_value(limit),
        }
    }
}

/// Lifetime figures per registered customer, from completed orders that
/// contain at least one product outside the exclusion list. Guest orders
/// (customer id 0) are not attributed to anyone.
pub fn analyze_users(orders: &[Order], exclusions: &ExclusionList) -> UsersReport {
    let mut users: BTreeMap<u64, UserSummary> = BTreeMap::new();

    for order in orders.iter().filter(|o| o.is_completed() && o.customer_id != 0) {
        let Some(total) = order.total_amount() else {
            continue;
        };
        if !order.product_names().any(|name| !exclusions.is_excluded(name)) {
            continue;
        }
        users
            .entry(order.customer_id)
            .or_insert_with(|| UserSummary::open(order))
            .record(order, total, exclusions);
    }

    let users = users
        .into_values()
        .map(|mut user| {
            user.subscription_months = match (&user.first_order_date, &user.last_order_date) {
                (Some(first), Some(last)) => months_between(first, last),
                _ => 0,
            };
            user
        })
        .collect();
    UsersReport { users }
}
