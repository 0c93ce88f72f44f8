use chrono::Duration;
use log::*;

use crate::{
    db_types::NewWebhookNotification,
    storefront_types::extract_external_ref,
    traits::{IngestOutcome, OrderSyncDatabase, OrderSyncError},
};

/// Default idempotency horizon: a redelivered event older than this is treated as new. The platform does not
/// redeliver events that old in practice.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// A signature-verified notification as captured at the HTTP boundary. The payload is the raw body, untouched;
/// parsing only happens at dispatch time.
#[derive(Debug, Clone)]
pub struct IncomingNotification {
    pub shop_domain: String,
    pub topic: String,
    /// The platform-provided event id; doubles as the idempotency key.
    pub event_id: String,
    pub payload: String,
    /// JSON snapshot of the transport headers, for operator forensics.
    pub headers: String,
}

/// `WebhookFlowApi` is the ingestion half of the pipeline: ledger check, then durable enqueue, then ack.
/// Processing happens later, in the dispatcher; ingestion never runs business logic.
#[derive(Debug, Clone)]
pub struct WebhookFlowApi<B> {
    db: B,
    expiry_horizon: Duration,
}

impl<B> WebhookFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, expiry_horizon: Duration::hours(DEFAULT_EXPIRY_HOURS) }
    }

    pub fn with_expiry_horizon(mut self, horizon: Duration) -> Self {
        self.expiry_horizon = horizon;
        self
    }
}

impl<B> WebhookFlowApi<B>
where B: OrderSyncDatabase
{
    /// Ingest a verified notification.
    ///
    /// The idempotency check happens before any other side effect, and the check itself is the atomic insert into
    /// the ledger. A duplicate is acknowledged without being queued; everything else is stored pending and due
    /// immediately.
    pub async fn ingest(&self, incoming: IncomingNotification) -> Result<IngestOutcome, OrderSyncError> {
        let integration = self
            .db
            .fetch_integration_by_domain(&incoming.shop_domain)
            .await?
            .ok_or_else(|| OrderSyncError::IntegrationNotFound(incoming.shop_domain.clone()))?;
        if !integration.is_active() {
            return Err(OrderSyncError::IntegrationRevoked(incoming.shop_domain.clone()));
        }
        if self.db.observe_event(&incoming.event_id, integration.id, self.expiry_horizon).await?
            == crate::db_types::ObserveResult::Duplicate
        {
            info!("🪝️ Event {} for {} is a duplicate; acknowledging without enqueueing", incoming.event_id, incoming.shop_domain);
            return Ok(IngestOutcome::Duplicate);
        }
        // Signature has been checked by now, so parsing the body to tag the queue entry is safe.
        let external_ref = extract_external_ref(&incoming.payload);
        let notification = NewWebhookNotification {
            integration_id: integration.id,
            shop_domain: incoming.shop_domain,
            topic: incoming.topic,
            payload: incoming.payload,
            headers: incoming.headers,
            idempotency_key: incoming.event_id,
            external_ref,
        };
        match self.db.enqueue_notification(notification).await? {
            Some(n) => {
                debug!("🪝️ Notification [{}] accepted for topic {}", n.id, n.topic);
                Ok(IngestOutcome::Enqueued(n.id))
            },
            // The ledger said new but the queue already holds the key: an expired ledger row was reclaimed while
            // the original queue entry still exists. Treat as duplicate.
            None => Ok(IngestOutcome::Duplicate),
        }
    }

    /// Removes expired ledger entries. Invoked by the background worker.
    pub async fn prune_ledger(&self) -> Result<u64, OrderSyncError> {
        let pruned = self.db.prune_idempotency_ledger().await?;
        if pruned > 0 {
            debug!("🎫️ Pruned {pruned} expired idempotency record(s)");
        }
        Ok(pruned)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
