use std::collections::BTreeMap;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A tag score or count attached to a media item.
///
/// The metadata store hands these to us as arbitrary JSON numbers, some of
/// which are whole values encoded as floats (`3.0`). Whole values are folded
/// into the integer variant so they never come out fractional on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TagValue {
    Int(i64),
    /// Whole values above i64::MAX, kept exact instead of rounding through f64.
    UInt(u64),
    Float(f64),
}

impl TagValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(i) => Some(*i),
            TagValue::UInt(_) | TagValue::Float(_) => None,
        }
    }
}

impl Serialize for TagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TagValue::Int(i) => serializer.serialize_i64(*i),
            TagValue::UInt(u) => serializer.serialize_u64(*u),
            TagValue::Float(f) => serializer.serialize_f64(*f),
        }
    }
}

impl<'de> Deserialize<'de> for TagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = serde_json::Number::deserialize(deserializer)?;

        if let Some(i) = n.as_i64() {
            return Ok(TagValue::Int(i));
        }
        if let Some(u) = n.as_u64() {
            // Larger than i64::MAX; stays an exact integer
            return Ok(TagValue::UInt(u));
        }

        let f = n
            .as_f64()
            .ok_or_else(|| D::Error::custom("tag value is not a number"))?;
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            Ok(TagValue::Int(f as i64))
        } else {
            Ok(TagValue::Float(f))
        }
    }
}

/// Snapshot of a media item as stored in the metadata database.
///
/// This is the after-image shape the dispatcher interprets. Only
/// `subscriber_id` and `item_id` are required for fan-out; everything else is
/// passed through to clients as-is. Unknown fields are ignored so upstream
/// schema additions never break ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(default)]
    pub subscriber_id: String,
    #[serde(default)]
    pub item_id: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tag_map: BTreeMap<String, TagValue>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_valued_tags_stay_integral() {
        let record: MediaRecord = serde_json::from_value(json!({
            "subscriber_id": "u1",
            "item_id": "f1",
            "tag_map": {"Crow": 3, "Owl": 1}
        }))
        .unwrap();

        assert_eq!(record.tag_map["Crow"], TagValue::Int(3));
        assert_eq!(record.tag_map["Owl"], TagValue::Int(1));

        let out = serde_json::to_value(&record.tag_map).unwrap();
        assert_eq!(out, json!({"Crow": 3, "Owl": 1}));
    }

    #[test]
    fn whole_valued_float_normalizes_to_int() {
        let v: TagValue = serde_json::from_value(json!(3.0)).unwrap();
        assert_eq!(v, TagValue::Int(3));
        assert_eq!(serde_json::to_value(v).unwrap(), json!(3));
    }

    #[test]
    fn fractional_tag_stays_float() {
        let v: TagValue = serde_json::from_value(json!(0.87)).unwrap();
        assert_eq!(v, TagValue::Float(0.87));
        assert_eq!(serde_json::to_value(v).unwrap(), json!(0.87));
    }

    #[test]
    fn huge_whole_tag_survives_exactly() {
        let v: TagValue = serde_json::from_value(json!(u64::MAX)).unwrap();
        assert_eq!(v, TagValue::UInt(u64::MAX));
        assert_eq!(serde_json::to_value(v).unwrap(), json!(u64::MAX));
    }

    #[test]
    fn non_numeric_tag_is_rejected() {
        let result: Result<TagValue, _> = serde_json::from_value(json!("three"));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_record_fields_are_ignored() {
        let record: MediaRecord = serde_json::from_value(json!({
            "subscriber_id": "u1",
            "item_id": "f1",
            "processing_status": "done",
            "detections": [{"box": [0, 0, 10, 10]}]
        }))
        .unwrap();
        assert_eq!(record.subscriber_id, "u1");
        assert!(record.tag_map.is_empty());
    }

    #[test]
    fn records_with_the_same_fields_compare_equal() {
        let a: MediaRecord = serde_json::from_value(json!({
            "subscriber_id": "u1",
            "item_id": "f1",
            "tag_map": {"Crow": 3}
        }))
        .unwrap();
        let b = a.clone();
        assert_eq!(a, b);
    }
}
