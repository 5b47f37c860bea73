pub mod courses;
pub mod exclusions;
pub mod fiscal;
pub mod pivot;
pub mod products;
pub mod stats;
pub mod users;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::{newest_first, Order};

use self::courses::{analyze_course, CourseReport};
use self::exclusions::ExclusionList;
use self::fiscal::{filter_by_fiscal_year, fiscal_year, fiscal_year_bounds};
use self::pivot::{pivot_by_product_and_month, ProductMonthPivot};
use self::stats::{calculate_stats, OrderStats};
use self::users::{analyze_users, UsersReport};

/// Courses shown on the dashboard, in display order.
pub const DEFAULT_COURSES: [&str; 3] = ["Living Latin", "Elementa", "Modern Greek for Classicists"];

const RECENT_ORDER_COUNT: usize = 10;

pub fn current_fiscal_year(today: NaiveDate) -> i32 {
    fiscal_year(&today)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CourseSummary {
    pub course: String,
    /// Absent when no order in the period contains the course.
    pub report: Option<CourseReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecentOrder {
    pub id: u64,
    pub customer_name: String,
    pub date_created: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total: Option<BigDecimal>,
    pub status: String,
}

impl From<&Order> for RecentOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            customer_name: order.customer_name(),
            date_created: order.date_created.clone(),
            total: order.total_amount(),
            status: order.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardReport {
    pub fiscal_year: i32,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// Over every stored order.
    pub stats: OrderStats,
    /// Restricted to `fiscal_year`.
    pub courses: Vec<CourseSummary>,
    /// Most recent stored orders, newest first.
    pub recent_orders: Vec<RecentOrder>,
}

/// Report entry points that need configuration beyond the orders themselves.
#[derive(Debug, Clone)]
pub struct Aggregator {
    exclusions: ExclusionList,
    courses: Vec<String>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(
            ExclusionList::default(),
            DEFAULT_COURSES.iter().map(|c| c.to_string()).collect(),
        )
    }
}

impl Aggregator {
    pub fn new(exclusions: ExclusionList, courses: Vec<String>) -> Self {
        Self {
            exclusions,
            courses,
        }
    }

    pub fn exclusions(&self) -> &ExclusionList {
        &self.exclusions
    }

    pub fn courses(&self) -> &[String] {
        &self.courses
    }

    pub fn analyze_users(&self, orders: &[Order]) -> UsersReport {
        analyze_users(orders, &self.exclusions)
    }

    pub fn pivot_by_product_and_month(&self, orders: &[Order]) -> ProductMonthPivot {
        pivot_by_product_and_month(orders, &self.exclusions, &self.courses)
    }

    /// Overall stats and latest orders, plus course reports for the fiscal
    /// year containing `today`.
    pub fn dashboard(&self, orders: &[Order], today: NaiveDate) -> DashboardReport {
        let year = current_fiscal_year(today);
        let period = filter_by_fiscal_year(orders, year);
        let mut newest = orders.to_vec();
        newest.sort_by(newest_first);

        let courses = self
            .courses
            .iter()
            .map(|course| CourseSummary {
                course: course.clone(),
                report: analyze_course(&period, course),
            })
            .collect();
        let bounds = fiscal_year_bounds(year);

        DashboardReport {
            fiscal_year: year,
            period_start: bounds.map(|(start, _)| start),
            period_end: bounds.map(|(_, end)| end),
            stats: calculate_stats(orders),
            courses,
            recent_orders: newest
                .iter()
                .take(RECENT_ORDER_COUNT)
                .map(RecentOrder::from)
                .collect(),
        }
    }
}

/// Today's date in local time.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn current_fiscal_year_follows_september_cutover() {
        assert_eq!(current_fiscal_year(date(2024, 9, 1)), 2025);
        assert_eq!(current_fiscal_year(date(2025, 3, 1)), 2025);
    }

    #[test]
    fn dashboard_courses_cover_only_the_current_fiscal_year() {
        let orders: Vec<Order> = (1..=14)
            .map(|i| {
                serde_json::from_value::<Order>(json!({
                    "id": i, "status": "completed", "total": "10",
                    "date_created": format!("2024-10-{:02}T08:00:00", i),
                    "line_items": [{"name": "Elementa - Individual", "total": "10"}]
                }))
                .unwrap()
            })
            .chain(std::iter::once(
                serde_json::from_value::<Order>(json!({
                    "id": 99, "status": "completed", "total": "500",
                    "date_created": "2024-08-31T08:00:00",
                    "line_items": [{"name": "Living Latin - Group", "total": "500"}]
                }))
                .unwrap(),
            ))
            .collect();

        let report = Aggregator::default().dashboard(&orders, date(2025, 2, 1));

        assert_eq!(report.fiscal_year, 2025);
        assert_eq!(report.period_start, Some(date(2024, 9, 1)));
        assert_eq!(report.period_end, Some(date(2025, 8, 31)));
        assert_eq!(report.stats.completed_orders, 15);
        assert_eq!(report.recent_orders.len(), 10);
        assert_eq!(report.recent_orders[0].id, 14);

        let names: Vec<&str> = report.courses.iter().map(|c| c.course.as_str()).collect();
        assert_eq!(names, DEFAULT_COURSES.to_vec());
        assert!(report.courses[0].report.is_none());
        assert_eq!(
            report.courses[1].report.as_ref().map(|r| r.individual_orders),
            Some(14)
        );
        assert!(report.courses[2].report.is_none());
    }

    #[test]
    fn dashboard_stats_and_recent_orders_span_every_fiscal_year() {
        let orders: Vec<Order> = serde_json::from_value(json!([
            {"id": 1, "status": "completed", "total": "100",
             "date_created": "2023-10-01T08:00:00",
             "line_items": [{"name": "Elementa - Individual", "total": "100"}]},
            {"id": 2, "status": "completed", "total": "10",
             "date_created": "2024-10-01T08:00:00",
             "line_items": [{"name": "Elementa - Individual", "total": "10"}]},
            {"id": 3, "status": "completed", "total": "5",
             "date_created": "2024-11-01T08:00:00",
             "line_items": [{"name": "Elementa - Individual", "total": "5"}]}
        ]))
        .unwrap();

        let report = Aggregator::default().dashboard(&orders, date(2025, 2, 1));

        assert_eq!(report.stats.total_orders, 3);
        assert_eq!(report.stats.completed_orders, 3);
        assert_eq!(report.stats.total_revenue, BigDecimal::from(115));
        let ids: Vec<u64> = report.recent_orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(
            report.courses[1].report.as_ref().map(|r| r.total_orders),
            Some(2)
        );
    }

    #[test]
    fn aggregator_applies_its_exclusions() {
        let orders: Vec<Order> = serde_json::from_value(json!([
            {"id": 1, "status": "completed", "total": "10", "customer_id": 4,
             "date_created": "2024-10-01T08:00:00",
             "line_items": [{"name": "Internal Sample", "total": "10"}]}
        ]))
        .unwrap();

        let aggregator = Aggregator::new(
            ExclusionList::new(["internal sample"]),
            vec!["Elementa".to_string()],
        );

        assert!(aggregator.analyze_users(&orders).users.is_empty());
        assert!(aggregator.pivot_by_product_and_month(&orders).revenue.rows.is_empty());
        assert_eq!(
            Aggregator::default().analyze_users(&orders).users.len(),
            1
        );
    }
}
