use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Order status as reported by the store. Unknown statuses are kept verbatim
/// so that rewriting the local store never loses information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
    CheckoutDraft,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::CheckoutDraft => "checkout-draft",
            OrderStatus::Other(s) => s,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Other("unknown".to_string())
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "on-hold" => OrderStatus::OnHold,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            "refunded" => OrderStatus::Refunded,
            "failed" => OrderStatus::Failed,
            "checkout-draft" => OrderStatus::CheckoutDraft,
            _ => OrderStatus::Other(s),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Decimal string; numeric JSON values are coerced.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meta_data: Vec<MetaData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    pub fn amount(&self) -> Option<BigDecimal> {
        parse_amount(self.total.as_deref()?)
    }

    /// Lowercased `payment-term` metadata value, if present.
    pub fn payment_term(&self) -> Option<String> {
        self.meta_data
            .iter()
            .find(|m| m.key == "payment-term")
            .and_then(|m| m.value.as_str())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    #[serde(default, skip_serializing_if = "is_default")]
    pub status: OrderStatus,
    /// Decimal string; numeric JSON values are coerced.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub total: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(default, skip_serializing_if = "is_default")]
    pub customer_id: u64,
    #[serde(default, skip_serializing_if = "is_default")]
    pub billing: Billing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_via: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<LineItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Decode a list of raw JSON records, skipping the ones that do not look
    /// like an order. Returns the decoded orders and the number skipped.
    pub fn from_records(records: Vec<Value>) -> (Vec<Order>, usize) {
        let mut skipped = 0;
        let orders = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Order>(record) {
                Ok(order) => Some(order),
                Err(e) => {
                    log::warn!("Skipping malformed order record: {}", e);
                    skipped += 1;
                    None
                }
            })
            .collect();
        (orders, skipped)
    }

    pub fn total_amount(&self) -> Option<BigDecimal> {
        parse_amount(self.total.as_deref()?)
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(self.date_created.as_deref()?)
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    /// A completed order with a numeric total: the unit every revenue report counts.
    pub fn is_countable_sale(&self) -> bool {
        self.is_completed() && self.total_amount().is_some()
    }

    /// Renewals are generated by the subscriptions plugin; everything else is a new purchase.
    pub fn is_subscription_renewal(&self) -> bool {
        self.created_via.as_deref() == Some("subscription")
    }

    pub fn customer_name(&self) -> String {
        format!("{} {}", self.billing.first_name, self.billing.last_name)
            .trim()
            .to_string()
    }

    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.line_items.iter().filter_map(|item| item.name.as_deref())
    }
}

/// Newest first; orders without a parseable date sink to the end.
pub fn newest_first(a: &Order, b: &Order) -> Ordering {
    b.created_at()
        .cmp(&a.created_at())
        .then_with(|| b.id.cmp(&a.id))
}

/// Parse the store's naive timestamps, either `2024-09-05T10:00:00` or
/// `2024-09-05 10:00:00`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let format = if raw.contains('T') {
        "%Y-%m-%dT%H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M:%S"
    };
    NaiveDateTime::parse_from_str(raw.trim(), format).ok()
}

pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(raw.trim()).ok()
}

/// Lowercase and collapse internal whitespace so catalog names compare reliably.
pub fn normalize_product_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fields the source omitted decode to their default and are written back omitted.
fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
