use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::domain::errors::SyncError;
use crate::domain::order::Order;
use crate::domain::ports::{OrderPage, OrderSource, PageQuery};

const ORDERS_PATH: &str = "/wp-json/wc/v3/orders";
const TOTAL_HEADER: &str = "X-WP-Total";
const ERROR_BODY_LIMIT: usize = 200;

/// Statuses worth another attempt: rate limiting and gateway hiccups.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct WooCommerceCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl std::fmt::Debug for WooCommerceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooCommerceCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

/// Reads the WooCommerce v3 order listing with HTTP Basic credentials.
pub struct WooCommerceClient {
    http: Client,
    orders_url: String,
    credentials: WooCommerceCredentials,
    timeout: Duration,
    retry: RetryPolicy,
}

impl WooCommerceClient {
    pub fn new(
        base_url: &str,
        credentials: WooCommerceCredentials,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            orders_url: format!("{}{}", base_url.trim_end_matches('/'), ORDERS_PATH),
            credentials,
            timeout,
            retry,
        })
    }

    pub fn orders_url(&self) -> &str {
        &self.orders_url
    }

    async fn send(&self, query: &PageQuery) -> Result<Response, reqwest::Error> {
        self.http
            .get(&self.orders_url)
            .basic_auth(
                &self.credentials.consumer_key,
                Some(&self.credentials.consumer_secret),
            )
            .query(&query_params(query))
            .send()
            .await
    }

    fn classify(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            SyncError::Connection(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }

    async fn read_page(&self, response: Response) -> Result<OrderPage, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let total_hint = response
            .headers()
            .get(TOTAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let records = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(records)) => records,
            Ok(other) => {
                return Err(SyncError::MalformedResponse(format!(
                    "expected a JSON array of orders, got {}",
                    json_kind(&other)
                )))
            }
            Err(e) => return Err(SyncError::MalformedResponse(e.to_string())),
        };

        let received = records.len();
        let (orders, skipped) = Order::from_records(records);
        if skipped > 0 {
            log::warn!("Skipped {} malformed orders in API response", skipped);
        }
        Ok(OrderPage {
            orders,
            received,
            total_hint,
        })
    }
}

#[async_trait]
impl OrderSource for WooCommerceClient {
    async fn fetch_page(&self, query: &PageQuery) -> Result<OrderPage, SyncError> {
        let mut retry = 0;
        loop {
            let can_retry = retry < self.retry.max_retries;
            match self.send(query).await {
                Ok(response) if can_retry && is_retryable(response.status()) => {
                    log::warn!(
                        "Page {} returned {}; retry {}/{}",
                        query.page,
                        response.status(),
                        retry + 1,
                        self.retry.max_retries
                    );
                }
                Ok(response) => return self.read_page(response).await,
                Err(e) if can_retry && (e.is_timeout() || e.is_connect()) => {
                    log::warn!(
                        "Page {} failed: {}; retry {}/{}",
                        query.page,
                        e,
                        retry + 1,
                        self.retry.max_retries
                    );
                }
                Err(e) => return Err(self.classify(e)),
            }
            tokio::time::sleep(self.retry.delay_for(retry)).await;
            retry += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

fn query_params(query: &PageQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("per_page", query.per_page.to_string()),
        ("page", query.page.to_string()),
        ("orderby", "date".to_string()),
        ("order", "desc".to_string()),
    ];
    if let Some(after) = query.after {
        params.push(("after", after.format("%Y-%m-%dT%H:%M:%S").to_string()));
    }
    params
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
