use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use order_engine::OrderSyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Webhook signature missing or invalid.")]
    SignatureRejected,
    #[error("Missing or malformed shop domain header.")]
    MalformedShopDomain,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MalformedShopDomain => StatusCode::BAD_REQUEST,
            // Platforms only redeliver on non-2xx; an unauthorized request must never be acknowledged.
            Self::SignatureRejected => StatusCode::UNAUTHORIZED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<OrderSyncError> for ServerError {
    fn from(e: OrderSyncError) -> Self {
        match e {
            // An unknown or revoked integration at the boundary is an authentication failure, never enqueued.
            OrderSyncError::IntegrationNotFound(_) | OrderSyncError::IntegrationRevoked(_) => Self::SignatureRejected,
            OrderSyncError::OrderNotFound(id) => Self::NoRecordFound(format!("order {id}")),
            OrderSyncError::NotificationNotFound(id) => Self::NoRecordFound(format!("notification {id}")),
            other => Self::BackendError(other.to_string()),
        }
    }
}
