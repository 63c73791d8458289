use academy_core::model::{LessonId, ProgressSnapshot};
use serde_json::Value;

use crate::error::ProgressError;

/// Cache payload is a plain JSON array of lesson id strings, in snapshot order.
pub(crate) fn encode(snapshot: &ProgressSnapshot) -> Value {
    Value::Array(
        snapshot
            .iter()
            .map(|id| Value::String(id.as_str().to_owned()))
            .collect(),
    )
}

pub(crate) fn decode(value: Value) -> Result<Vec<LessonId>, ProgressError> {
    serde_json::from_value(value).map_err(|e| ProgressError::CacheCorrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encodes_as_plain_list() {
        let snapshot = ProgressSnapshot::from_ids([
            LessonId::new("L2").unwrap(),
            LessonId::new("L1").unwrap(),
        ]);
        assert_eq!(encode(&snapshot), json!(["L2", "L1"]));
    }

    #[test]
    fn non_list_payloads_are_corrupt() {
        assert!(matches!(
            decode(json!({"L1": true})),
            Err(ProgressError::CacheCorrupt(_))
        ));
        assert!(decode(json!(["L1", 7])).is_err());
        assert!(decode(json!(["L1", ""])).is_err());
    }

    #[test]
    fn decodes_lesson_ids() {
        let ids = decode(json!(["L1", "L9"])).unwrap();
        assert_eq!(ids, vec![LessonId::new("L1").unwrap(), LessonId::new("L9").unwrap()]);
    }
}
