use aviary_types::{EventKind, MediaRecord, MutationEvent};

/// Why one feed event produced no fan-out. Skips are per-event; they never
/// abort the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    IrrelevantKind(EventKind),
    NoAfterImage,
    Malformed(String),
    MissingIds,
}

/// Decide, once, what a raw feed event means: either a parsed-and-validated
/// media record worth fanning out, or a reason to skip it.
pub fn interpret(event: &MutationEvent) -> Result<MediaRecord, SkipReason> {
    match event.kind {
        EventKind::Created | EventKind::Updated => {}
        kind => return Err(SkipReason::IrrelevantKind(kind)),
    }

    let image = event.after_image.as_ref().ok_or(SkipReason::NoAfterImage)?;

    let record: MediaRecord = serde_json::from_value(image.clone())
        .map_err(|e| SkipReason::Malformed(e.to_string()))?;

    if record.subscriber_id.is_empty() || record.item_id.is_empty() {
        return Err(SkipReason::MissingIds);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn updated_event_parses() {
        let event: MutationEvent = serde_json::from_value(json!({
            "kind": "UPDATED",
            "after_image": {"subscriber_id": "u1", "item_id": "f1"}
        }))
        .unwrap();

        let record = interpret(&event).unwrap();
        assert_eq!(record.subscriber_id, "u1");
        assert_eq!(record.item_id, "f1");
    }

    #[test]
    fn removed_kind_is_skipped() {
        let event: MutationEvent = serde_json::from_value(json!({
            "kind": "REMOVED",
            "after_image": {"subscriber_id": "u1", "item_id": "f1"}
        }))
        .unwrap();
        assert_eq!(
            interpret(&event),
            Err(SkipReason::IrrelevantKind(EventKind::Removed))
        );
    }

    #[test]
    fn missing_after_image_is_skipped() {
        let event: MutationEvent =
            serde_json::from_value(json!({"kind": "CREATED"})).unwrap();
        assert_eq!(interpret(&event), Err(SkipReason::NoAfterImage));
    }

    #[test]
    fn malformed_after_image_is_skipped() {
        let event: MutationEvent = serde_json::from_value(json!({
            "kind": "UPDATED",
            "after_image": "not an object"
        }))
        .unwrap();
        assert!(matches!(
            interpret(&event),
            Err(SkipReason::Malformed(_))
        ));
    }

    #[test]
    fn missing_ids_are_skipped() {
        let event: MutationEvent = serde_json::from_value(json!({
            "kind": "UPDATED",
            "after_image": {"item_id": "f1"}
        }))
        .unwrap();
        assert_eq!(interpret(&event), Err(SkipReason::MissingIds));
    }
}
