use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{MediaRecord, TagValue};

/// Kind of a metadata mutation on the feed.
///
/// Unknown kinds collapse into `Other` so new upstream event types are
/// skipped instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    Updated,
    Removed,
    #[serde(other)]
    Other,
}

/// One record off the metadata change feed. Ephemeral; never persisted.
///
/// `after_image` is the full post-mutation snapshot for CREATED/UPDATED and
/// absent for REMOVED. It stays raw JSON here; interpretation happens once,
/// at the dispatch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_image: Option<serde_json::Value>,
}

/// Message pushed to every channel of the owning subscriber when a media
/// item's metadata changes. Built fresh per event; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FanoutPayload {
    #[serde(rename = "FILE_UPDATE")]
    FileUpdate {
        item_id: String,
        item_type: Option<String>,
        thumbnail_url: Option<String>,
        tag_map: BTreeMap<String, TagValue>,
        created_at: Option<String>,
    },
}

impl FanoutPayload {
    pub fn from_record(record: MediaRecord) -> Self {
        FanoutPayload::FileUpdate {
            item_id: record.item_id,
            item_type: record.item_type,
            thumbnail_url: record.thumbnail_url,
            tag_map: record.tag_map,
            created_at: record.created_at,
        }
    }
}
