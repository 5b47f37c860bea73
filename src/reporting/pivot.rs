use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::AddAssign;

use bigdecimal::BigDecimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::{normalize_product_name, Order};

use super::exclusions::ExclusionList;

/// Label for products that belong to none of the configured courses.
pub const OTHER_COURSE: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow<T> {
    pub product: String,
    /// Configured course the product belongs to, or [`OTHER_COURSE`].
    pub course: String,
    /// Month (`YYYY-MM`) to cell value; months without activity are absent.
    pub values: BTreeMap<String, T>,
    pub total: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable<T> {
    pub rows: Vec<PivotRow<T>>,
    /// Column sums for every month, zero where no row has a value.
    pub totals: BTreeMap<String, T>,
    pub grand_total: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductMonthPivot {
    pub months: Vec<String>,
    #[schema(value_type = Object)]
    pub revenue: PivotTable<BigDecimal>,
    #[schema(value_type = Object)]
    pub new_orders: PivotTable<usize>,
}

/// Position of the first configured course contained in the product name.
fn course_rank(normalized: &str, courses: &[String]) -> Option<usize> {
    courses
        .iter()
        .position(|course| normalized.contains(&normalize_product_name(course)))
}

struct ProductCells {
    display: String,
    revenue: BTreeMap<String, BigDecimal>,
    new_orders: BTreeMap<String, BTreeSet<u64>>,
}

fn build_table<T>(
    keyed_rows: Vec<(String, String, BTreeMap<String, T>)>,
    months: &[String],
) -> PivotTable<T>
where
    T: Default + Clone + for<'a> AddAssign<&'a T>,
{
    let mut totals: BTreeMap<String, T> =
        months.iter().map(|m| (m.clone(), T::default())).collect();
    let mut grand_total = T::default();
    let rows = keyed_rows
        .into_iter()
        .map(|(product, course, values)| {
            let mut total = T::default();
            for month in months {
                if let Some(value) = values.get(month) {
                    total += value;
                    *totals.entry(month.clone()).or_default() += value;
                }
            }
            grand_total += &total;
            PivotRow {
                product,
                course,
                values,
                total,
            }
        })
        .collect();
    PivotTable {
        rows,
        totals,
        grand_total,
    }
}

/// Product by month tables over completed orders with a numeric total and a
/// parseable creation date. Products are merged on their normalized name and
/// shown under the first spelling seen; excluded products are dropped.
///
/// Revenue cells sum line item totals. Order cells count distinct new
/// (non-renewal) orders containing the product that month.
pub fn pivot_by_product_and_month(
    orders: &[Order],
    exclusions: &ExclusionList,
    courses: &[String],
) -> ProductMonthPivot {
    let mut products: HashMap<String, ProductCells> = HashMap::new();
    let mut months: BTreeSet<String> = BTreeSet::new();

    for order in orders.iter().filter(|o| o.is_countable_sale()) {
        let Some(created) = order.created_at() else {
            continue;
        };
        let month = created.format("%Y-%m").to_string();
        let renewal = order.is_subscription_renewal();
        months.insert(month.clone());

        for item in &order.line_items {
            let Some(name) = item.name.as_deref() else {
                continue;
            };
            let key = normalize_product_name(name);
            if key.is_empty() || exclusions.is_excluded(name) {
                continue;
            }
            let cells = products.entry(key).or_insert_with(|| ProductCells {
                display: name.trim().to_string(),
                revenue: BTreeMap::new(),
                new_orders: BTreeMap::new(),
            });
            if let Some(amount) = item.amount() {
                *cells.revenue.entry(month.clone()).or_default() += amount;
            }
            if !renewal {
                cells
                    .new_orders
                    .entry(month.clone())
                    .or_default()
                    .insert(order.id);
            }
        }
    }

    let mut ranked: Vec<(Option<usize>, ProductCells)> = products
        .into_iter()
        .map(|(key, cells)| (course_rank(&key, courses), cells))
        .collect();
    ranked.sort_by(|a, b| {
        let rank = |r: Option<usize>| r.unwrap_or(usize::MAX);
        rank(a.0).cmp(&rank(b.0)).then_with(|| a.1.display.cmp(&b.1.display))
    });

    let months: Vec<String> = months.into_iter().collect();
    let mut revenue_rows = Vec::with_capacity(ranked.len());
    let mut order_rows = Vec::with_capacity(ranked.len());
    for (rank, cells) in ranked {
        let course = rank
            .and_then(|i| courses.get(i))
            .cloned()
            .unwrap_or_else(|| OTHER_COURSE.to_string());
        let counts = cells
            .new_orders
            .into_iter()
            .map(|(month, ids)| (month, ids.len()))
            .collect();
        revenue_rows.push((cells.display.clone(), course.clone(), cells.revenue));
        order_rows.push((cells.display, course, counts));
    }

    ProductMonthPivot {
        revenue: build_table(revenue_rows, &months),
        new_orders: build_table(order_rows, &months),
        months,
    }
}
