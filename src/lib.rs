pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod reporting;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tokio::sync::Mutex;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::sync_service::SyncService;
use config::{AppConfig, ConfigError};
use infrastructure::cache::OrderCache;
use infrastructure::json_store::JsonFileStore;
use infrastructure::woo_client::WooCommerceClient;
use reporting::{Aggregator, DEFAULT_COURSES};

pub type WooSyncService = SyncService<WooCommerceClient, JsonFileStore>;

/// Shared by every worker: the store, its report cache, and the one
/// synchronizer allowed to write to it.
pub struct AppState {
    pub store: JsonFileStore,
    pub cache: OrderCache,
    pub aggregator: Aggregator,
    pub sync: Mutex<WooSyncService>,
}

impl AppState {
    pub fn new(
        store: JsonFileStore,
        cache: OrderCache,
        aggregator: Aggregator,
        sync: WooSyncService,
    ) -> Self {
        Self {
            store,
            cache,
            aggregator,
            sync: Mutex::new(sync),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let client = WooCommerceClient::new(
            &config.base_url,
            config.credentials.clone(),
            config.request_timeout,
            config.retry.clone(),
        )?;
        let store = JsonFileStore::new(config.orders_file.clone());
        let aggregator = Aggregator::new(
            config.exclusions.clone(),
            DEFAULT_COURSES.iter().map(|c| c.to_string()).collect(),
        );
        Ok(Self::new(
            store.clone(),
            OrderCache::with_ttl(config.cache_ttl),
            aggregator,
            SyncService::new(client, store, config.sync.clone()),
        ))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::reports::dashboard,
        handlers::reports::stats,
        handlers::reports::fiscal_year_products,
        handlers::reports::course,
        handlers::reports::users,
        handlers::reports::monthly,
        handlers::sync::run_sync,
    ),
    tags(
        (name = "reports", description = "Sales reports over the synced orders"),
        (name = "sync", description = "WooCommerce order synchronization"),
    )
)]
pub struct ApiDoc;

/// Register the report and sync routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reports")
            .route("/dashboard", web::get().to(handlers::reports::dashboard))
            .route("/stats", web::get().to(handlers::reports::stats))
            .route(
                "/fiscal-years/{year}/products",
                web::get().to(handlers::reports::fiscal_year_products),
            )
            .route("/courses", web::get().to(handlers::reports::course))
            .route("/users", web::get().to(handlers::reports::users))
            .route("/monthly", web::get().to(handlers::reports::monthly)),
    )
    .route("/sync", web::post().to(handlers::sync::run_sync));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: web::Data<AppState>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
