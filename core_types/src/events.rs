use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeletionEvent {
    DrainStarted {
        collection: String,
        batch_size: usize,
    },
    BatchDeleted {
        count: usize,
        total_deleted: usize,
        batch_number: usize,
    },
    BatchSizeReduced {
        from: usize,
        to: usize,
    },
    DrainCompleted {
        total_deleted: usize,
        batches: usize,
    },
    DrainFailed {
        error: String,
        total_deleted: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::DeletionEvent;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = DeletionEvent::BatchDeleted {
            count: 100,
            total_deleted: 200,
            batch_number: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "batch_deleted");
        assert_eq!(json["count"], 100);
        assert_eq!(json["total_deleted"], 200);
    }
}
