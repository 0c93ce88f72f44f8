use chrono::Duration;
use log::*;
use order_engine::{events::EventPublishers, DispatcherApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the dispatch worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick runs one bounded dispatch batch, then the maintenance sweep: stale `Processing` leases are returned
/// to `Pending` and expired idempotency records are pruned. The manual `/api/dispatch` endpoint runs the same
/// cycle on demand; the `Processing` lease keeps the two from stepping on each other.
pub fn start_dispatch_worker(
    db: SqliteDatabase,
    publishers: EventPublishers,
    interval_secs: u64,
    batch_size: i64,
    stale_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        let dispatcher = DispatcherApi::new(db, publishers);
        info!("🕰️ Dispatch worker started (every {interval_secs}s, batch size {batch_size})");
        loop {
            timer.tick().await;
            match dispatcher.dispatch_batch(batch_size).await {
                Ok(report) if report.due > 0 => {
                    info!(
                        "🕰️ Dispatch cycle: {} due, {} succeeded, {} retried, {} failed",
                        report.due, report.succeeded, report.retried, report.failed
                    );
                },
                Ok(_) => trace!("🕰️ Dispatch cycle: queue empty"),
                Err(e) => error!("🕰️ Error running dispatch cycle: {e}"),
            }
            match dispatcher.maintenance_sweep(stale_after).await {
                Ok((reset, pruned)) => {
                    if reset > 0 || pruned > 0 {
                        info!("🕰️ Maintenance sweep: {reset} stale lease(s) reset, {pruned} ledger record(s) pruned");
                    }
                },
                Err(e) => error!("🕰️ Error running maintenance sweep: {e}"),
            }
        }
    })
}
