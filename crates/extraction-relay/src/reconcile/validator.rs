//! Validation of structured extraction payloads
//!
//! The upstream service sometimes answers HTTP 200 with an error object in
//! the body. Such payloads must not be persisted as a successful result.

use serde_json::Value;

/// Keys the upstream uses to smuggle an error into a 200 response
const RESERVED_KEYS: [&str; 2] = ["error", "message"];

/// Whether a structured payload counts as a valid success
pub fn is_valid_extraction(payload: &Value) -> bool {
    if is_empty_value(payload) {
        return false;
    }

    match payload {
        Value::Object(map) => !RESERVED_KEYS.iter().any(|key| map.contains_key(*key)),
        _ => true,
    }
}

/// Empty or absent values
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_empty_and_error_objects() {
        assert!(!is_valid_extraction(&json!({})));
        assert!(!is_valid_extraction(&json!({"error": "x"})));
        assert!(!is_valid_extraction(&json!({"message": "x"})));
        assert!(!is_valid_extraction(&json!({"data": {"a": 1}, "message": "partial"})));
    }

    #[test]
    fn test_rejects_absent_values() {
        assert!(!is_valid_extraction(&Value::Null));
        assert!(!is_valid_extraction(&json!([])));
        assert!(!is_valid_extraction(&json!("")));
    }

    #[test]
    fn test_accepts_data() {
        assert!(is_valid_extraction(&json!({"field": "value"})));
        assert!(is_valid_extraction(&json!([1, 2, 3])));
        assert!(is_valid_extraction(&json!([{"error": "inside a list is fine"}])));
        assert!(is_valid_extraction(&json!("text")));
    }
}
