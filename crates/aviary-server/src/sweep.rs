use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use aviary_registry::Registry;

/// Background task that prunes registry rows for channels that died without
/// a close event. `last_seen` is refreshed by pongs and successful pushes,
/// so only truly silent channels age out.
pub async fn run_sweep_loop(registry: Arc<Registry>, stale_after: Duration) {
    let sweep_every = (stale_after / 4).max(Duration::from_secs(60));
    let mut interval = tokio::time::interval(sweep_every);

    loop {
        interval.tick().await;

        let cutoff = Utc::now()
            - chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::hours(1));

        match registry.remove_stale(cutoff) {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: pruned {} stale channels", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}
