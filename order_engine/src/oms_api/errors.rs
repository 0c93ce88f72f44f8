use thiserror::Error;

use crate::{storefront_types::PayloadError, traits::OrderSyncError};

/// Failure classification for topic handlers, which drives the retry decision in the dispatcher.
///
/// * `Transient` — worth retrying with backoff: database hiccups, upstream timeouts, lock conflicts.
/// * `Permanent` — will never succeed no matter how often it is redelivered: malformed payloads, unknown topics,
///   revoked integrations. Marked failed immediately without burning through the retry ladder.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    #[error("Permanent handler failure: {0}")]
    Permanent(String),
    #[error("Transient handler failure: {0}")]
    Transient(String),
}

impl HandlerError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Permanent(m) | Self::Transient(m) => m,
        }
    }
}

impl From<OrderSyncError> for HandlerError {
    fn from(e: OrderSyncError) -> Self {
        match e {
            // Database trouble is the canonical retryable fault.
            OrderSyncError::DatabaseError(_) => Self::Transient(e.to_string()),
            OrderSyncError::InvalidPayload(_) |
            OrderSyncError::IntegrationRevoked(_) |
            OrderSyncError::IntegrationNotFound(_) => Self::Permanent(e.to_string()),
            other => Self::Transient(other.to_string()),
        }
    }
}

impl From<PayloadError> for HandlerError {
    fn from(e: PayloadError) -> Self {
        Self::Permanent(e.to_string())
    }
}
