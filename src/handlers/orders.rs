use axum::{Json, extract::Query};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const ORDER_CHECK_MESSAGE: &str = "check_order request received";

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub order_date: Option<String>,
    pub comments: Option<String>,
}

/// Echo of the order-check parameters. The three identity fields are always
/// present (null when not supplied); the optional ones only when given.
#[derive(Debug, Serialize)]
pub struct OrderEcho {
    pub message: &'static str,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl From<OrderQuery> for OrderEcho {
    fn from(q: OrderQuery) -> Self {
        Self {
            message: ORDER_CHECK_MESSAGE,
            first_name: q.first_name,
            last_name: q.last_name,
            email: q.email,
            order_date: q.order_date,
            comments: q.comments,
        }
    }
}

/// GET /check_orders
pub async fn check_orders(Query(query): Query<OrderQuery>) -> Json<OrderEcho> {
    Json(query.into())
}

/// GET /
pub async fn hello() -> &'static str {
    "Hello, World!"
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
