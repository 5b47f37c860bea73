//! In-process stand-in for the WooCommerce order listing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use sales_dashboard::application::sync_service::{SyncService, SyncSettings};
use sales_dashboard::infrastructure::json_store::JsonFileStore;
use sales_dashboard::infrastructure::woo_client::{
    RetryPolicy, WooCommerceClient, WooCommerceCredentials,
};
use sales_dashboard::WooSyncService;
use serde_json::{json, Value};

/// Basic auth header for `ck_test:cs_test`.
pub const EXPECTED_AUTH: &str = "Basic Y2tfdGVzdDpjc190ZXN0";

#[derive(Default)]
pub struct FakeWoo {
    /// JSON body per page, 1-based; pages past the end are empty arrays.
    pub pages: Vec<Value>,
    pub total_header: Option<u64>,
    /// Answer this many requests with 503 before behaving.
    pub transient_failures: AtomicU32,
    pub fixed_status: Option<(u16, String)>,
    pub raw_body: Option<String>,
    /// Hold every response this long before answering.
    pub delay: Option<Duration>,
    pub queries: Mutex<Vec<HashMap<String, String>>>,
    pub auth_headers: Mutex<Vec<Option<String>>>,
}

impl FakeWoo {
    pub fn with_pages(pages: Vec<Value>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn query(&self, index: usize) -> HashMap<String, String> {
        self.queries.lock().unwrap()[index].clone()
    }
}

async fn list_orders(
    fake: web::Data<FakeWoo>,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    let query = query.into_inner();
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    fake.queries.lock().unwrap().push(query);
    fake.auth_headers.lock().unwrap().push(
        req.headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    if let Some(delay) = fake.delay {
        tokio::time::sleep(delay).await;
    }
    if fake.transient_failures.load(Ordering::SeqCst) > 0 {
        fake.transient_failures.fetch_sub(1, Ordering::SeqCst);
        return HttpResponse::ServiceUnavailable().body("try again later");
    }
    if let Some((status, body)) = &fake.fixed_status {
        return HttpResponse::build(StatusCode::from_u16(*status).unwrap()).body(body.clone());
    }
    if let Some(body) = &fake.raw_body {
        return HttpResponse::Ok()
            .content_type("application/json")
            .body(body.clone());
    }

    let body = fake
        .pages
        .get(page.saturating_sub(1))
        .cloned()
        .unwrap_or_else(|| json!([]));
    let mut resp = HttpResponse::Ok();
    if let Some(total) = fake.total_header {
        resp.insert_header(("X-WP-Total", total.to_string()));
    }
    resp.json(body)
}

/// Start the fake on an ephemeral port; returns its base URL.
pub fn spawn_fake(fake: FakeWoo) -> (String, web::Data<FakeWoo>) {
    let fake = web::Data::new(fake);
    let app_fake = fake.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_fake.clone())
            .route("/wp-json/wc/v3/orders", web::get().to(list_orders))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("Failed to bind the fake WooCommerce server");
    let addr = server.addrs()[0];
    tokio::spawn(server.run());
    (format!("http://{}", addr), fake)
}

/// A local URL nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn client(base_url: &str, max_retries: u32) -> WooCommerceClient {
    client_with_timeout(base_url, Duration::from_secs(5), max_retries)
}

pub fn client_with_timeout(
    base_url: &str,
    timeout: Duration,
    max_retries: u32,
) -> WooCommerceClient {
    WooCommerceClient::new(
        base_url,
        WooCommerceCredentials {
            consumer_key: "ck_test".to_string(),
            consumer_secret: "cs_test".to_string(),
        },
        timeout,
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
        },
    )
    .expect("Failed to build the HTTP client")
}

pub fn sync_service(
    base_url: &str,
    store: JsonFileStore,
    per_page: u32,
    max_retries: u32,
) -> WooSyncService {
    service_with_client(client(base_url, max_retries), store, per_page)
}

pub fn service_with_client(
    client: WooCommerceClient,
    store: JsonFileStore,
    per_page: u32,
) -> WooSyncService {
    SyncService::new(
        client,
        store,
        SyncSettings {
            per_page,
            page_delay: Duration::ZERO,
        },
    )
}

pub fn order_json(id: u64, date: &str, total: &str, product: &str) -> Value {
    json!({
        "id": id,
        "status": "completed",
        "total": total,
        "customer_id": id * 10,
        "date_created": date,
        "created_via": "checkout",
        "billing": {"first_name": "Test", "last_name": format!("Customer {}", id), "email": "t@example.com"},
        "line_items": [{"name": product, "total": total}],
        "currency": "USD"
    })
}
