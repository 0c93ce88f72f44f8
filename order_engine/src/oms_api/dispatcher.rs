//! The dispatcher / retry engine.
//!
//! A periodically-invoked batch job, not a busy loop: each invocation drains one bounded batch of due
//! notifications and returns. The `Processing` status acts as a lease, so overlapping invocations (or multiple
//! workers) resolve every row to exactly one owner via the conditional update in the queue layer.
use chrono::Duration;
use log::*;
use serde::Serialize;

use crate::{
    db_types::{WebhookNotification, WebhookTopic},
    events::{EventPublishers, OrderCreatedEvent},
    oms_api::{
        errors::HandlerError,
        normalizer::{self, NormalizerOutcome},
    },
    storefront_types::OrderPayload,
    traits::{OrderSyncDatabase, OrderSyncError},
};

pub const DEFAULT_BATCH_SIZE: i64 = 10;
pub const DEFAULT_STALE_AFTER_MINUTES: i64 = 10;

/// Outcome counts for one dispatch cycle, surfaced on the admin "force dispatch" endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub due: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
    /// Lost the lease race to a concurrent dispatcher; not an error.
    pub skipped: usize,
}

pub struct DispatcherApi<B> {
    db: B,
    publishers: EventPublishers,
}

impl<B> DispatcherApi<B> {
    pub fn new(db: B, publishers: EventPublishers) -> Self {
        Self { db, publishers }
    }
}

impl<B> DispatcherApi<B>
where B: OrderSyncDatabase
{
    /// Runs one dispatch cycle over at most `batch_size` due notifications, oldest first.
    ///
    /// A failure in one notification never affects the rest of the batch: handler errors are converted into queue
    /// state transitions, and infrastructure errors are logged and counted, not propagated.
    pub async fn dispatch_batch(&self, batch_size: i64) -> Result<DispatchReport, OrderSyncError> {
        let due = self.db.fetch_due_notifications(batch_size).await?;
        let mut report = DispatchReport { due: due.len(), ..Default::default() };
        if due.is_empty() {
            return Ok(report);
        }
        debug!("🚚️ Dispatching {} due notification(s)", due.len());
        for notification in due {
            let id = notification.id;
            match self.process_notification(notification).await {
                Ok(outcome) => match outcome {
                    ProcessOutcome::Succeeded => report.succeeded += 1,
                    ProcessOutcome::Retried => report.retried += 1,
                    ProcessOutcome::Failed => report.failed += 1,
                    ProcessOutcome::LeaseLost => report.skipped += 1,
                },
                Err(e) => {
                    // Queue bookkeeping itself failed. The row stays leased and the stale sweep will recover it.
                    error!("🚚️ Internal error while dispatching notification [{id}]: {e}");
                    report.failed += 1;
                },
            }
        }
        info!(
            "🚚️ Dispatch cycle done: {} succeeded, {} retried, {} failed, {} skipped",
            report.succeeded, report.retried, report.failed, report.skipped
        );
        Ok(report)
    }

    async fn process_notification(&self, notification: WebhookNotification) -> Result<ProcessOutcome, OrderSyncError> {
        if !self.db.lease_notification(notification.id).await? {
            trace!("🚚️ Notification [{}] was claimed by another dispatcher", notification.id);
            return Ok(ProcessOutcome::LeaseLost);
        }
        let integration = self.db.fetch_integration_by_domain(&notification.shop_domain).await?;
        let integration = match integration {
            Some(i) if i.is_active() => i,
            // Not a transient condition: the integration will not come back on its own. No retry.
            Some(_) => {
                self.db.mark_notification_failed(notification.id, "integration revoked").await?;
                return Ok(ProcessOutcome::Failed);
            },
            None => {
                self.db.mark_notification_failed(notification.id, "integration not found").await?;
                return Ok(ProcessOutcome::Failed);
            },
        };
        let result = self.run_handler(&notification, &integration).await;
        match result {
            Ok(outcome) => {
                self.db.mark_notification_succeeded(notification.id).await?;
                if let NormalizerOutcome::Created(order) = outcome {
                    for publisher in &self.publishers.order_created {
                        publisher.publish(OrderCreatedEvent { order: order.clone() }).await;
                    }
                }
                Ok(ProcessOutcome::Succeeded)
            },
            Err(e) if e.is_permanent() => {
                warn!("🚚️ Notification [{}] failed permanently: {}", notification.id, e.message());
                self.db.mark_notification_failed(notification.id, e.message()).await?;
                Ok(ProcessOutcome::Failed)
            },
            Err(e) => {
                let updated = self.db.record_failed_attempt(notification.id, e.message()).await?;
                if updated.status == crate::db_types::NotificationStatus::Failed {
                    warn!(
                        "🚚️ Notification [{}] exhausted its {} attempts: {}",
                        notification.id, updated.max_attempts, e.message()
                    );
                    Ok(ProcessOutcome::Failed)
                } else {
                    debug!(
                        "🚚️ Notification [{}] attempt {} failed; next attempt at {}",
                        notification.id, updated.attempts, updated.next_attempt_at
                    );
                    Ok(ProcessOutcome::Retried)
                }
            },
        }
    }

    /// Routes the notification to its topic handler. Fails closed on anything unrecognised.
    async fn run_handler(
        &self,
        notification: &WebhookNotification,
        integration: &crate::db_types::Integration,
    ) -> Result<NormalizerOutcome, HandlerError> {
        let topic: WebhookTopic = notification
            .topic
            .parse()
            .map_err(|_| HandlerError::Permanent(format!("unrecognised topic: {}", notification.topic)))?;
        let payload = OrderPayload::parse(&notification.payload)?;
        match topic {
            WebhookTopic::OrdersCreate => normalizer::apply_order_created(&self.db, integration, &payload).await,
            WebhookTopic::OrdersUpdated => normalizer::apply_order_updated(&self.db, integration, &payload).await,
        }
    }

    /// Maintenance pass run alongside dispatching: recover stale leases and prune the idempotency ledger.
    pub async fn maintenance_sweep(&self, stale_after: Duration) -> Result<(u64, u64), OrderSyncError> {
        let reset = self.db.reset_stale_notifications(stale_after).await?;
        let pruned = self.db.prune_idempotency_ledger().await?;
        Ok((reset, pruned))
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

enum ProcessOutcome {
    Succeeded,
    Retried,
    Failed,
    LeaseLost,
}
