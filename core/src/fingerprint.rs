//! Canonicalization of a transition request for idempotency comparison
//! (§4.3). Two requests sharing a `client_event_id` are "the same request"
//! iff their canonical fingerprints are byte-equal.

use serde_json::{Map, Value};

/// Everything that identifies a transition request, before normalization.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub task_id: String,
    pub actor_user_id: String,
    pub action: String,
    pub expected_row_version: i64,
    pub payload: Value,
}

/// Server-generated keys that must never participate in the comparison:
/// they differ between the first call and a replay by construction.
const DROPPED_KEYS: &[&str] = &["fix_task_id"];

/// Textual fields whose surrounding whitespace is insignificant.
const TRIMMED_KEYS: &[&str] = &["reason", "fix_title"];

/// Identifier-shaped fields normalized to lowercase for comparison,
/// regardless of action.
const IDENTIFIER_KEYS: &[&str] = &["assign_to", "user_id"];

/// Normalize one payload in place, action-aware: `review_reject` also
/// trims free-text fields and lowercases `severity`, since only that
/// action's payload carries them.
fn normalize_payload(action: &str, payload: &Value) -> Value {
    let Value::Object(map) = payload else {
        return payload.clone();
    };

    let mut out = Map::new();
    for (key, value) in map {
        if DROPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let normalized = if IDENTIFIER_KEYS.contains(&key.as_str()) {
            normalize_identifier(value)
        } else if action == "review_reject" && TRIMMED_KEYS.contains(&key.as_str()) {
            trim_text(value)
        } else if action == "review_reject" && key == "severity" {
            normalize_enum_like(value)
        } else {
            value.clone()
        };
        out.insert(key.clone(), normalized);
    }
    Value::Object(out)
}

fn normalize_identifier(value: &Value) -> Value {
    match value.as_str() {
        Some(s) => Value::String(s.trim().to_ascii_lowercase()),
        None => value.clone(),
    }
}

fn trim_text(value: &Value) -> Value {
    match value.as_str() {
        Some(s) => Value::String(s.trim().to_string()),
        None => value.clone(),
    }
}

fn normalize_enum_like(value: &Value) -> Value {
    match value.as_str() {
        Some(s) => Value::String(s.trim().to_ascii_lowercase()),
        None => value.clone(),
    }
}

/// Produce the canonical JSON representation used for equality comparison:
/// keys sorted (via `serde_json::Map`'s `BTreeMap`-backed ordering once
/// parsed through `serde_json::Value`'s canonical form), fixed separators.
pub fn canonicalize(request: &TransitionRequest) -> String {
    let normalized_payload = normalize_payload(&request.action, &request.payload);

    let mut envelope = Map::new();
    envelope.insert("task_id".to_string(), Value::String(request.task_id.clone()));
    envelope.insert(
        "actor_user_id".to_string(),
        Value::String(request.actor_user_id.clone()),
    );
    envelope.insert("action".to_string(), Value::String(request.action.clone()));
    envelope.insert(
        "expected_row_version".to_string(),
        Value::Number(request.expected_row_version.into()),
    );
    envelope.insert("payload".to_string(), normalized_payload);

    // serde_json's default feature serializes maps with sorted keys only
    // when the `preserve_order` feature is disabled, which is the case
    // here — `Value::Object` is backed by a `BTreeMap`.
    serde_json::to_string(&Value::Object(envelope)).expect("canonical value is always valid JSON")
}

/// Equal canonical form ⇒ "same request" (§4.3).
pub fn same_request(a: &TransitionRequest, b: &TransitionRequest) -> bool {
    canonicalize(a) == canonicalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(payload: Value) -> TransitionRequest {
        TransitionRequest {
            task_id: "T1".to_string(),
            actor_user_id: "U1".to_string(),
            action: "assign".to_string(),
            expected_row_version: 1,
            payload,
        }
    }

    #[test]
    fn identical_requests_fingerprint_equal() {
        let a = request(json!({ "assign_to": "U2" }));
        let b = request(json!({ "assign_to": "U2" }));
        assert!(same_request(&a, &b));
    }

    #[test]
    fn assign_to_case_and_whitespace_are_insignificant() {
        let a = request(json!({ "assign_to": "U2" }));
        let b = request(json!({ "assign_to": " u2 " }));
        assert!(same_request(&a, &b));
    }

    #[test]
    fn different_assign_to_fingerprints_differ() {
        let a = request(json!({ "assign_to": "U2" }));
        let b = request(json!({ "assign_to": "U3" }));
        assert!(!same_request(&a, &b));
    }

    #[test]
    fn fix_task_id_is_dropped_before_comparison() {
        let a = request(json!({ "assign_to": "U2" }));
        let b = request(json!({ "assign_to": "U2", "fix_task_id": "F1" }));
        assert!(same_request(&a, &b));
    }

    #[test]
    fn review_reject_trims_reason_and_lowercases_severity() {
        let mut a = request(json!({ "reason": "porosity", "severity": "MAJOR" }));
        a.action = "review_reject".to_string();
        let mut b = request(json!({ "reason": "  porosity  ", "severity": "major" }));
        b.action = "review_reject".to_string();
        assert!(same_request(&a, &b));
    }

    #[test]
    fn non_reject_actions_do_not_trim_free_text_fields() {
        let mut a = request(json!({ "reason": "porosity" }));
        a.action = "shift_release".to_string();
        let mut b = request(json!({ "reason": " porosity " }));
        b.action = "shift_release".to_string();
        assert!(!same_request(&a, &b));
    }
}
