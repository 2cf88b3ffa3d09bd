use aviary_types::FanoutPayload;

/// Result of one delivery attempt to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The channel no longer exists; the caller should drop its registry row.
    Gone,
    /// Delivery failed but the channel may still be alive (timeouts land
    /// here). Not retried within the same batch.
    Transient(String),
}

/// Delivers one message to one channel.
#[allow(async_fn_in_trait)]
pub trait PushTransport {
    async fn send(&self, channel_id: &str, payload: &FanoutPayload) -> SendOutcome;
}
