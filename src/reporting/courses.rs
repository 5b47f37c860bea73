use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::{BigDecimal, Zero};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::Order;

use super::products::PurchaseChannel;

static SEATS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*seats?").expect("valid seat pattern"));

/// Upper bound of order total (inclusive) to seat count, for group products
/// whose name does not state the seats.
const SEAT_BRACKETS: [(u32, u32); 4] = [(300, 2), (500, 4), (700, 6), (900, 8)];
const LARGEST_GROUP_SEATS: u32 = 10;

/// Seats bought with a group product: the `<N> seats` figure in the product
/// name, or a price-bracket estimate from the order total.
pub fn seat_count(product_name: &str, order_total: &BigDecimal) -> u32 {
    if let Some(seats) = SEATS_PATTERN
        .captures(product_name)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return seats;
    }
    SEAT_BRACKETS
        .iter()
        .find(|(limit, _)| order_total <= &BigDecimal::from(*limit))
        .map(|(_, seats)| *seats)
        .unwrap_or(LARGEST_GROUP_SEATS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BillingTerm {
    Monthly,
    Annual,
}

fn billing_term(payment_term: Option<&str>, lowered_name: &str) -> Option<BillingTerm> {
    if payment_term == Some("monthly") || lowered_name.contains("monthly") {
        Some(BillingTerm::Monthly)
    } else if payment_term == Some("annual") || lowered_name.contains("annual") {
        Some(BillingTerm::Annual)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CourseReport {
    pub course: String,
    pub total_orders: usize,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    pub new_orders: usize,
    #[schema(value_type = String)]
    pub new_revenue: BigDecimal,
    pub recurring_orders: usize,
    #[schema(value_type = String)]
    pub recurring_revenue: BigDecimal,
    pub individual_orders: usize,
    pub individual_monthly: usize,
    pub individual_annual: usize,
    #[schema(value_type = String)]
    pub individual_revenue: BigDecimal,
    pub group_orders: usize,
    #[schema(value_type = String)]
    pub group_revenue: BigDecimal,
    /// Seat count to the ids of the group orders bought at that size.
    #[schema(value_type = Object)]
    pub group_by_seats: BTreeMap<u32, Vec<u64>>,
    /// Line item revenue for the course's individual products, split by channel.
    #[schema(value_type = String)]
    pub individual_new_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub individual_recurring_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub group_new_revenue: BigDecimal,
    #[schema(value_type = String)]
    pub group_recurring_revenue: BigDecimal,
}

#[derive(Default)]
struct CourseTally {
    individual: BTreeSet<u64>,
    monthly: BTreeSet<u64>,
    annual: BTreeSet<u64>,
    group: BTreeSet<u64>,
    seats: BTreeMap<u32, BTreeSet<u64>>,
    individual_new: BigDecimal,
    individual_recurring: BigDecimal,
    group_new: BigDecimal,
    group_recurring: BigDecimal,
}

/// Completed orders containing the course, matched case-insensitively on line
/// item names. Returns `None` when no order matches.
///
/// An order is counted at most once per bucket, however many of its line
/// items match.
pub fn analyze_course(orders: &[Order], course_name: &str) -> Option<CourseReport> {
    let needle = course_name.to_lowercase();
    let course_orders: Vec<(&Order, BigDecimal)> = orders
        .iter()
        .filter(|o| o.is_completed())
        .filter(|o| {
            o.product_names()
                .any(|name| name.to_lowercase().contains(&needle))
        })
        .filter_map(|o| o.total_amount().map(|total| (o, total)))
        .collect();

    if course_orders.is_empty() {
        return None;
    }

    let mut tally = CourseTally::default();
    for (order, total) in &course_orders {
        let channel = PurchaseChannel::of(order);
        for item in &order.line_items {
            let Some(name) = item.name.as_deref() else {
                continue;
            };
            let lowered = name.to_lowercase();
            if !lowered.contains(&needle) {
                continue;
            }
            let line_amount = item.amount().unwrap_or_else(BigDecimal::zero);

            if lowered.contains("individual") {
                tally.individual.insert(order.id);
                match billing_term(item.payment_term().as_deref(), &lowered) {
                    Some(BillingTerm::Monthly) => {
                        tally.monthly.insert(order.id);
                    }
                    Some(BillingTerm::Annual) => {
                        tally.annual.insert(order.id);
                    }
                    None => {}
                }
                match channel {
                    PurchaseChannel::New => tally.individual_new += line_amount,
                    PurchaseChannel::Recurring => tally.individual_recurring += line_amount,
                }
            } else if lowered.contains("group") || lowered.contains("seats") {
                tally.group.insert(order.id);
                tally
                    .seats
                    .entry(seat_count(name, total))
                    .or_default()
                    .insert(order.id);
                match channel {
                    PurchaseChannel::New => tally.group_new += line_amount,
                    PurchaseChannel::Recurring => tally.group_recurring += line_amount,
                }
            }
        }
    }

    let revenue_of = |ids: &BTreeSet<u64>| {
        sum_totals(
            course_orders
                .iter()
                .filter(|(o, _)| ids.contains(&o.id))
                .map(|(_, total)| total),
        )
    };
    let (recurring, new): (Vec<_>, Vec<_>) = course_orders
        .iter()
        .partition(|(o, _)| o.is_subscription_renewal());

    Some(CourseReport {
        course: course_name.to_string(),
        total_orders: course_orders.len(),
        total_revenue: sum_totals(course_orders.iter().map(|(_, total)| total)),
        new_orders: new.len(),
        new_revenue: sum_totals(new.iter().map(|(_, total)| total)),
        recurring_orders: recurring.len(),
        recurring_revenue: sum_totals(recurring.iter().map(|(_, total)| total)),
        individual_orders: tally.individual.len(),
        individual_monthly: tally.monthly.len(),
        individual_annual: tally.annual.len(),
        individual_revenue: revenue_of(&tally.individual),
        group_orders: tally.group.len(),
        group_revenue: revenue_of(&tally.group),
        group_by_seats: tally
            .seats
            .into_iter()
            .map(|(seats, ids)| (seats, ids.into_iter().collect()))
            .collect(),
        individual_new_revenue: tally.individual_new,
        individual_recurring_revenue: tally.individual_recurring,
        group_new_revenue: tally.group_new,
        group_recurring_revenue: tally.group_recurring,
    })
}

fn sum_totals<'a>(totals: impl Iterator<Item = &'a BigDecimal>) -> BigDecimal {
    totals.fold(BigDecimal::zero(), |acc, total| acc + total)
}
