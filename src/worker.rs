use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::catalog::CatalogClient;
use crate::sync::Synchronizer;

/// Re-runs the bulk sync every `period` until the handle is aborted.
///
/// Each tick is one best-effort pass; a failed pass is logged and the next
/// tick picks up whatever is still missing.
pub fn spawn_periodic_sync<C>(sync: Arc<Synchronizer<C>>, period: Duration) -> JoinHandle<()>
where
    C: CatalogClient + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sync.bulk_sync().await {
                Ok(report) if report.is_noop() => {}
                Ok(report) => info!(stored = report.stored, "background sync stored items"),
                Err(err) => warn!(error = %err, "background sync failed"),
            }
        }
    })
}
