/// One open push channel. A row exists iff the channel is believed open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub channel_id: String,
    pub subscriber_id: String,
    pub opened_at: String,
    pub last_seen: String,
}
