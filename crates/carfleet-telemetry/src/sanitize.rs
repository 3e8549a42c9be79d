//! # Payload Redaction
//!
//! Replaces the values of sensitive keys before a payload is logged.
//! Matching is exact, case-sensitive, and limited to the top level of an
//! object: a `password` nested inside `{"card": {...}}` passes through.

use serde_json::Value;

/// Placeholder substituted for every redacted value.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Keys redacted from request bodies.
pub const REQUEST_SENSITIVE_KEYS: &[&str] =
    &["password", "token", "apiKey", "secret", "authorization"];

/// Keys redacted on the response-logging path.
pub const RESPONSE_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "apiKey",
    "secret",
    "authorization",
    "creditCard",
    "ssn",
];

/// Return a copy of `payload` with every top-level key in `sensitive_keys`
/// replaced by [`REDACTION_MARKER`]. Non-object payloads are returned as-is.
pub fn sanitize(payload: &Value, sensitive_keys: &[&str]) -> Value {
    let Value::Object(map) = payload else {
        return payload.clone();
    };

    let mut sanitized = map.clone();
    for key in sensitive_keys {
        if let Some(value) = sanitized.get_mut(*key) {
            *value = Value::String(REDACTION_MARKER.to_string());
        }
    }
    Value::Object(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn redacts_top_level_sensitive_keys() {
        let body = json!({"username": "ada", "password": "hunter2", "token": 7});
        let out = sanitize(&body, REQUEST_SENSITIVE_KEYS);
        assert_eq!(out["username"], "ada");
        assert_eq!(out["password"], REDACTION_MARKER);
        assert_eq!(out["token"], REDACTION_MARKER);
    }

    #[test]
    fn input_is_not_mutated() {
        let body = json!({"password": "hunter2"});
        let before = body.clone();
        let _ = sanitize(&body, REQUEST_SENSITIVE_KEYS);
        assert_eq!(body, before);
    }

    #[test]
    fn non_objects_pass_through() {
        for payload in [json!(null), json!("password"), json!(3), json!([{"password": "x"}])] {
            assert_eq!(sanitize(&payload, REQUEST_SENSITIVE_KEYS), payload);
        }
    }

    #[test]
    fn nested_sensitive_keys_are_not_redacted() {
        // Redaction is shallow: only top-level keys are matched.
        let body = json!({"card": {"creditCard": "4111", "password": "x"}});
        let out = sanitize(&body, RESPONSE_SENSITIVE_KEYS);
        assert_eq!(out["card"]["creditCard"], "4111");
        assert_eq!(out["card"]["password"], "x");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let body = json!({"Password": "x", "apikey": "y", "apiKey": "z"});
        let out = sanitize(&body, REQUEST_SENSITIVE_KEYS);
        assert_eq!(out["Password"], "x");
        assert_eq!(out["apikey"], "y");
        assert_eq!(out["apiKey"], REDACTION_MARKER);
    }

    #[test]
    fn response_keys_extend_request_keys() {
        for key in REQUEST_SENSITIVE_KEYS {
            assert!(RESPONSE_SENSITIVE_KEYS.contains(key));
        }
        let out = sanitize(&json!({"ssn": "123", "creditCard": "4111"}), RESPONSE_SENSITIVE_KEYS);
        assert_eq!(out["ssn"], REDACTION_MARKER);
        assert_eq!(out["creditCard"], REDACTION_MARKER);
    }

    #[test]
    fn falsy_values_are_still_redacted() {
        let out = sanitize(&json!({"password": "", "token": null}), REQUEST_SENSITIVE_KEYS);
        assert_eq!(out["password"], REDACTION_MARKER);
        assert_eq!(out["token"], REDACTION_MARKER);
    }

    fn flat_object() -> impl Strategy<Value = Value> {
        let key = prop_oneof![
            Just("password".to_string()),
            Just("token".to_string()),
            Just("apiKey".to_string()),
            "[a-z]{1,8}",
        ];
        let value = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[ -~]{0,16}".prop_map(Value::String),
        ];
        proptest::collection::btree_map(key, value, 0..8)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        /// Keys outside the sensitive set keep their value and type.
        #[test]
        fn unrelated_keys_unchanged(payload in flat_object()) {
            let out = sanitize(&payload, REQUEST_SENSITIVE_KEYS);
            let (Value::Object(before), Value::Object(after)) = (&payload, &out) else {
                unreachable!("strategy only yields objects");
            };
            prop_assert_eq!(before.len(), after.len());
            for (key, value) in before {
                if REQUEST_SENSITIVE_KEYS.contains(&key.as_str()) {
                    prop_assert_eq!(&after[key], &json!(REDACTION_MARKER));
                } else {
                    prop_assert_eq!(&after[key], value);
                }
            }
        }

        /// Sanitizing twice equals sanitizing once.
        #[test]
        fn sanitize_is_idempotent(payload in flat_object()) {
            let once = sanitize(&payload, REQUEST_SENSITIVE_KEYS);
            let twice = sanitize(&once, REQUEST_SENSITIVE_KEYS);
            prop_assert_eq!(once, twice);
        }
    }
}
