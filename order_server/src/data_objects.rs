use order_engine::db_types::FulfillmentStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self { success: false, message: message.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailedNotificationsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: FulfillmentStatus,
}

/// One entry in a manual inventory sync request.
#[derive(Debug, Clone, Deserialize)]
pub struct StockSyncItem {
    pub product_id: i64,
    pub external_product_id: Option<String>,
    pub new_stock: i64,
}

/// Failed notification as exposed on the admin surface: enough for an operator to diagnose and intervene, without
/// dumping the whole payload by default.
#[derive(Debug, Clone, Serialize)]
pub struct FailedNotificationSummary {
    pub id: i64,
    pub shop_domain: String,
    pub topic: String,
    pub idempotency_key: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<order_engine::db_types::WebhookNotification> for FailedNotificationSummary {
    fn from(n: order_engine::db_types::WebhookNotification) -> Self {
        Self {
            id: n.id,
            shop_domain: n.shop_domain,
            topic: n.topic,
            idempotency_key: n.idempotency_key,
            attempts: n.attempts,
            last_error: n.last_error,
            created_at: n.created_at,
            processed_at: n.processed_at,
        }
    }
}
