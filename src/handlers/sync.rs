use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::sync_service::{SyncOutcome, SyncSummary};
use crate::errors::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncParams {
    /// Only fetch orders newer than the newest stored one. Defaults to true.
    #[serde(default = "default_incremental")]
    pub incremental: bool,
}

fn default_incremental() -> bool {
    true
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    /// One of `no_new_orders`, `merged` or `full_resync`.
    pub outcome: String,
    pub fetched: usize,
    pub total: usize,
    pub elapsed_secs: f64,
    pub message: String,
}

impl From<&SyncSummary> for SyncResponse {
    fn from(summary: &SyncSummary) -> Self {
        let outcome = match summary.outcome {
            SyncOutcome::NoNewOrders => "no_new_orders",
            SyncOutcome::Merged => "merged",
            SyncOutcome::FullResync => "full_resync",
        };
        Self {
            outcome: outcome.to_string(),
            fetched: summary.fetched,
            total: summary.total,
            elapsed_secs: summary.elapsed.as_secs_f64(),
            message: summary.message(),
        }
    }
}

/// POST /sync
///
/// Pulls orders from WooCommerce into the local store. Concurrent calls queue
/// behind the running one. The report cache is dropped after a successful run.
#[utoipa::path(
    post,
    path = "/sync",
    params(
        ("incremental" = Option<bool>, Query, description = "Fetch only new orders (default true)"),
    ),
    responses(
        (status = 200, description = "Sync finished", body = SyncResponse),
        (status = 404, description = "The store and the remote listing are both empty"),
        (status = 502, description = "WooCommerce request failed"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sync"
)]
pub async fn run_sync(
    state: web::Data<AppState>,
    query: web::Query<SyncParams>,
) -> Result<HttpResponse, AppError> {
    let incremental = query.into_inner().incremental;

    let summary = {
        let service = state.sync.lock().await;
        service.sync(incremental).await?
    };
    state.cache.invalidate();

    Ok(HttpResponse::Ok().json(SyncResponse::from(&summary)))
}
