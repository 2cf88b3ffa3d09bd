use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use aviary_registry::Registry;
use aviary_types::{FanoutPayload, MutationEvent};

use crate::ingest::{SkipReason, interpret};
use crate::transport::{PushTransport, SendOutcome};

/// Delivery counters for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub delivered: u64,
    pub gone: u64,
    pub transient: u64,
    pub skipped: u64,
}

impl BatchSummary {
    pub fn failed(&self) -> u64 {
        self.gone + self.transient
    }
}

/// Consumes mutation-feed batches and fans each relevant event out to the
/// owning subscriber's registered channels.
pub struct Dispatcher<T: PushTransport> {
    registry: Arc<Registry>,
    transport: T,
}

impl<T: PushTransport> Dispatcher<T> {
    pub fn new(registry: Arc<Registry>, transport: T) -> Self {
        Self { registry, transport }
    }

    /// Process one batch. Events are handled independently: a skip or a
    /// failed lookup affects only its own event, and delivery failures
    /// affect only their own channel. Transient failures are not retried
    /// here; the upstream feed's at-least-once redelivery is the recovery
    /// path.
    pub async fn process(&self, batch: &[MutationEvent]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for event in batch {
            let record = match interpret(event) {
                Ok(record) => record,
                Err(reason) => {
                    log_skip(&reason);
                    summary.skipped += 1;
                    continue;
                }
            };

            let subscriber_id = record.subscriber_id.clone();
            let item_id = record.item_id.clone();
            let payload = FanoutPayload::from_record(record);

            let channels = match self.registry.list_by_subscriber(&subscriber_id) {
                Ok(channels) => channels,
                Err(e) => {
                    // Abort only this event; redelivery will re-drive it
                    error!("channel lookup failed for {}: {}", subscriber_id, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            if channels.is_empty() {
                debug!("no active channels for {}, skipping item {}", subscriber_id, item_id);
                continue;
            }

            let mut delivered = 0u64;
            let mut failed = 0u64;

            for channel in &channels {
                match self.transport.send(&channel.channel_id, &payload).await {
                    SendOutcome::Delivered => {
                        delivered += 1;
                        summary.delivered += 1;
                        if let Err(e) = self.registry.touch(&channel.channel_id, Utc::now()) {
                            debug!("last_seen update failed for {}: {}", channel.channel_id, e);
                        }
                    }
                    SendOutcome::Gone => {
                        failed += 1;
                        summary.gone += 1;
                        warn!("channel {} is gone, dropping from registry", channel.channel_id);
                        if let Err(e) = self.registry.remove(&channel.channel_id) {
                            // Best-effort; the stale sweep will catch it
                            error!("failed to drop gone channel {}: {}", channel.channel_id, e);
                        }
                    }
                    SendOutcome::Transient(reason) => {
                        failed += 1;
                        summary.transient += 1;
                        warn!("delivery to {} failed: {}", channel.channel_id, reason);
                    }
                }
            }

            info!(
                "fan-out for item {} ({}): {} delivered, {} failed",
                item_id, subscriber_id, delivered, failed
            );
        }

        info!(
            "batch processed: {} delivered, {} failed, {} skipped",
            summary.delivered,
            summary.failed(),
            summary.skipped
        );
        summary
    }
}

fn log_skip(reason: &SkipReason) {
    match reason {
        SkipReason::IrrelevantKind(kind) => debug!("skipping {:?} event", kind),
        SkipReason::NoAfterImage => warn!("event has no after-image, skipping"),
        SkipReason::Malformed(e) => error!("failed to parse after-image: {}", e),
        SkipReason::MissingIds => warn!("after-image missing subscriber_id or item_id, skipping"),
    }
}
