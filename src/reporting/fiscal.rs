use chrono::{Datelike, NaiveDate};

use crate::domain::order::Order;

/// First month of the fiscal year (September).
const FISCAL_YEAR_START_MONTH: u32 = 9;

/// Fiscal years run September 1 to August 31 and are named after the calendar
/// year they end in.
pub fn fiscal_year<D: Datelike>(date: &D) -> i32 {
    if date.month() >= FISCAL_YEAR_START_MONTH {
        date.year() + 1
    } else {
        date.year()
    }
}

/// First and last day of a fiscal year.
pub fn fiscal_year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year - 1, FISCAL_YEAR_START_MONTH, 1)?;
    let end = NaiveDate::from_ymd_opt(year, FISCAL_YEAR_START_MONTH - 1, 31)?;
    Some((start, end))
}

/// Orders created inside the fiscal year. Orders without a parseable
/// creation date are left out.
pub fn filter_by_fiscal_year(orders: &[Order], year: i32) -> Vec<Order> {
    orders
        .iter()
        .filter(|order| {
            order
                .created_at()
                .is_some_and(|created| fiscal_year(&created) == year)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn order(id: u64, date_created: Option<&str>) -> Order {
        serde_json::from_value(json!({"id": id, "date_created": date_created})).unwrap()
    }

    #[test]
    fn september_starts_the_next_fiscal_year() {
        assert_eq!(fiscal_year(&date(2024, 9, 15)), 2025);
        assert_eq!(fiscal_year(&date(2024, 9, 1)), 2025);
        assert_eq!(fiscal_year(&date(2024, 12, 31)), 2025);
    }

    #[test]
    fn january_through_august_keep_the_calendar_year() {
        assert_eq!(fiscal_year(&date(2024, 8, 15)), 2024);
        assert_eq!(fiscal_year(&date(2024, 8, 31)), 2024);
        assert_eq!(fiscal_year(&date(2024, 1, 1)), 2024);
    }

    #[test]
    fn bounds_span_september_to_august() {
        let (start, end) = fiscal_year_bounds(2025).unwrap();
        assert_eq!(start, date(2024, 9, 1));
        assert_eq!(end, date(2025, 8, 31));
        assert_eq!(fiscal_year(&start), 2025);
        assert_eq!(fiscal_year(&end), 2025);
    }

    #[test]
    fn filter_keeps_only_orders_in_the_year() {
        let orders = vec![
            order(1, Some("2024-09-05T10:00:00")),
            order(2, Some("2024-08-31 23:59:59")),
            order(3, Some("2025-08-01T00:00:00")),
            order(4, Some("garbage")),
            order(5, None),
        ];
        let ids: Vec<u64> = filter_by_fiscal_year(&orders, 2025)
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
