//! Log field redaction
//!
//! Every structured payload that reaches a log line passes through
//! [`redact_value`]. Redaction is two-layered: sensitive key names are
//! blanked outright, and remaining string values are re-scanned for
//! secret-shaped substrings. Recursion through nested maps and arrays is
//! bounded at depth 10.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";
const MAX_DEPTH_SENTINEL: &str = "[MAX_DEPTH]";
const MAX_DEPTH: usize = 10;

/// Key fragments that mark a value as sensitive, matched
/// case-insensitively against both camelCase and snake_case names.
const SENSITIVE_KEY_PARTS: &[&str] = &[
    "token",
    "password",
    "secret",
    "apikey",
    "api_key",
    "authorization",
    "credentials",
];

/// Secret shapes hunted inside plain string values: bot tokens and
/// bearer/basic authorization headers embedded in messages or URLs.
static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\d+:[A-Za-z0-9_-]{30,}").expect("bot token pattern"),
        Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]{8,}").expect("bearer pattern"),
        Regex::new(r"(?i)basic\s+[A-Za-z0-9+/=]{8,}").expect("basic pattern"),
    ]
});

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// Mask secret-shaped substrings inside a string value.
fn scrub_string(s: &str) -> String {
    let mut out = s.to_string();
    for pattern in SECRET_PATTERNS.iter() {
        out = pattern.replace_all(&out, REDACTED).into_owned();
    }
    out
}

fn redact_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(MAX_DEPTH_SENTINEL.to_string());
    }

    match value {
        Value::Object(map) => {
            let redacted = map
                .iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), redact_at_depth(v, depth + 1))
                    }
                })
                .collect();
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| redact_at_depth(v, depth + 1))
                .collect(),
        ),
        Value::String(s) => Value::String(scrub_string(s)),
        other => other.clone(),
    }
}

/// Produce a copy of `value` safe for logging.
pub fn redact_value(value: &Value) -> Value {
    redact_at_depth(value, 0)
}

/// Convenience for log call sites holding parameter maps.
pub fn redact_to_string(value: &Value) -> String {
    redact_value(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_sensitive_keys() {
        let input = json!({
            "bot_token": "123:abc",
            "botToken": "456:def",
            "password": "hunter2",
            "webhook_secret": "shhh",
            "providerToken": "pay-123",
            "text": "hello"
        });
        let out = redact_value(&input);
        assert_eq!(out["bot_token"], REDACTED);
        assert_eq!(out["botToken"], REDACTED);
        assert_eq!(out["password"], REDACTED);
        assert_eq!(out["webhook_secret"], REDACTED);
        assert_eq!(out["providerToken"], REDACTED);
        assert_eq!(out["text"], "hello");
    }

    #[test]
    fn key_match_is_case_insensitive() {
        let input = json!({"Authorization": "Bearer abcdefgh1234", "CREDENTIALS": "x"});
        let out = redact_value(&input);
        assert_eq!(out["Authorization"], REDACTED);
        assert_eq!(out["CREDENTIALS"], REDACTED);
    }

    #[test]
    fn scrubs_token_shaped_strings() {
        let input = json!({
            "url": "https://api.telegram.org/bot123456789:AAHfBj3Xw9kabcDEF123ghiJKLmno45pqr/sendMessage"
        });
        let out = redact_value(&input);
        let url = out["url"].as_str().unwrap();
        assert!(url.contains(REDACTED));
        assert!(!url.contains("AAHfBj3Xw9"));
    }

    #[test]
    fn scrubs_bearer_headers_in_values() {
        let input = json!({"note": "sent with Bearer sk-9f8e7d6c5b4a"});
        let out = redact_value(&input);
        assert!(!out["note"].as_str().unwrap().contains("sk-9f8e7d6c5b4a"));
    }

    #[test]
    fn recurses_through_arrays_and_objects() {
        let input = json!({
            "updates": [
                {"message": {"api_key": "k1"}},
                {"message": {"text": "fine"}}
            ]
        });
        let out = redact_value(&input);
        assert_eq!(out["updates"][0]["message"]["api_key"], REDACTED);
        assert_eq!(out["updates"][1]["message"]["text"], "fine");
    }

    #[test]
    fn depth_bound_replaces_with_sentinel() {
        // Build an object nested 13 levels deep
        let mut value = json!("leaf");
        for _ in 0..13 {
            value = json!({ "inner": value });
        }
        let out = redact_value(&value);

        // Values at depth 11 are replaced wholesale by the sentinel
        let mut cursor = &out;
        for _ in 0..11 {
            cursor = &cursor["inner"];
        }
        assert_eq!(*cursor, MAX_DEPTH_SENTINEL);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(redact_value(&json!(42)), json!(42));
        assert_eq!(redact_value(&json!(true)), json!(true));
        assert_eq!(redact_value(&json!(null)), json!(null));
    }
}
