use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::order::Order;
use crate::errors::AppError;
use crate::reporting::courses::analyze_course;
use crate::reporting::fiscal::{filter_by_fiscal_year, fiscal_year_bounds};
use crate::reporting::products::{aggregate_by_product, total_product_revenue, ProductBreakdown};
use crate::reporting::stats::calculate_stats;
use crate::reporting::users::{UserSummary, UsersOverview};
use crate::reporting::today;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct FiscalYearProductsResponse {
    pub fiscal_year: i32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Orders dated inside the fiscal year, whatever their status.
    pub order_count: usize,
    #[schema(value_type = String)]
    pub total_revenue: BigDecimal,
    pub products: BTreeMap<String, ProductBreakdown>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CourseParams {
    /// Case-insensitive fragment of the product names, e.g. "Living Latin".
    pub name: String,
    /// Restrict to one fiscal year. All orders when absent.
    pub fiscal_year: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UsersParams {
    /// Length of each top list. Defaults to 20.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersResponse {
    pub overview: UsersOverview,
    pub users: Vec<UserSummary>,
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Orders from the cache, loading the store on a miss. An empty store is a 404:
/// nothing can be reported before the first sync.
async fn cached_orders(state: &web::Data<AppState>) -> Result<Arc<Vec<Order>>, AppError> {
    let state = state.clone();
    let orders = web::block(move || state.cache.get_or_load(&state.store))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    if orders.is_empty() {
        return Err(AppError::NotFound(
            "No orders in the local store; run a sync first".to_string(),
        ));
    }
    Ok(orders)
}

fn bounds_of(year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    fiscal_year_bounds(year)
        .ok_or_else(|| AppError::BadRequest(format!("Fiscal year {} is out of range", year)))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /reports/dashboard
///
/// Stats, course reports and the latest orders for the current fiscal year.
#[utoipa::path(
    get,
    path = "/reports/dashboard",
    responses(
        (status = 200, description = "Dashboard for the current fiscal year", body = crate::reporting::DashboardReport),
        (status = 404, description = "No orders synced yet"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let orders = cached_orders(&state).await?;
    let report = state.aggregator.dashboard(&orders, today());
    Ok(HttpResponse::Ok().json(report))
}

/// GET /reports/stats
#[utoipa::path(
    get,
    path = "/reports/stats",
    responses(
        (status = 200, description = "Headline figures over every stored order", body = crate::reporting::stats::OrderStats),
        (status = 404, description = "No orders synced yet"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let orders = cached_orders(&state).await?;
    Ok(HttpResponse::Ok().json(calculate_stats(&orders)))
}

/// GET /reports/fiscal-years/{year}/products
///
/// Per-product revenue for one fiscal year (September to August, named after
/// the year it ends in).
#[utoipa::path(
    get,
    path = "/reports/fiscal-years/{year}/products",
    params(
        ("year" = i32, Path, description = "Fiscal year, e.g. 2025 for Sep 2024 to Aug 2025"),
    ),
    responses(
        (status = 200, description = "Product breakdown", body = FiscalYearProductsResponse),
        (status = 400, description = "Year out of range"),
        (status = 404, description = "No orders synced yet"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn fiscal_year_products(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let year = path.into_inner();
    let (period_start, period_end) = bounds_of(year)?;
    let orders = cached_orders(&state).await?;

    let period = filter_by_fiscal_year(&orders, year);
    let products = aggregate_by_product(&period);

    Ok(HttpResponse::Ok().json(FiscalYearProductsResponse {
        fiscal_year: year,
        period_start,
        period_end,
        order_count: period.len(),
        total_revenue: total_product_revenue(&products),
        products,
    }))
}

/// GET /reports/courses
#[utoipa::path(
    get,
    path = "/reports/courses",
    params(
        ("name" = String, Query, description = "Course name fragment, matched case-insensitively"),
        ("fiscal_year" = Option<i32>, Query, description = "Restrict to one fiscal year"),
    ),
    responses(
        (status = 200, description = "Course report", body = crate::reporting::courses::CourseReport),
        (status = 400, description = "Empty course name or year out of range"),
        (status = 404, description = "No order contains the course"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn course(
    state: web::Data<AppState>,
    query: web::Query<CourseParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let name = params.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Course name must not be empty".to_string()));
    }
    if let Some(year) = params.fiscal_year {
        bounds_of(year)?;
    }

    let orders = cached_orders(&state).await?;
    let report = match params.fiscal_year {
        Some(year) => analyze_course(&filter_by_fiscal_year(&orders, year), name),
        None => analyze_course(&orders, name),
    };

    match report {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Err(AppError::NotFound(format!("No completed orders for course '{}'", name))),
    }
}

/// GET /reports/users
#[utoipa::path(
    get,
    path = "/reports/users",
    params(
        ("limit" = Option<usize>, Query, description = "Length of the top lists (default 20)"),
    ),
    responses(
        (status = 200, description = "Customer lifetime report", body = UsersResponse),
        (status = 400, description = "Limit is zero"),
        (status = 404, description = "No orders synced yet"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn users(
    state: web::Data<AppState>,
    query: web::Query<UsersParams>,
) -> Result<HttpResponse, AppError> {
    let limit = query.into_inner().limit;
    if limit == 0 {
        return Err(AppError::BadRequest("limit must be at least 1".to_string()));
    }

    let orders = cached_orders(&state).await?;
    let report = state.aggregator.analyze_users(&orders);
    Ok(HttpResponse::Ok().json(UsersResponse {
        overview: report.overview(limit),
        users: report.users,
    }))
}

/// GET /reports/monthly
///
/// Product by month revenue and new-order tables.
#[utoipa::path(
    get,
    path = "/reports/monthly",
    responses(
        (status = 200, description = "Product by month pivot", body = crate::reporting::pivot::ProductMonthPivot),
        (status = 404, description = "No orders synced yet"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "reports"
)]
pub async fn monthly(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let orders = cached_orders(&state).await?;
    Ok(HttpResponse::Ok().json(state.aggregator.pivot_by_product_and_month(&orders)))
}
