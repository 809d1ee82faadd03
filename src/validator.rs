//! Parameter validation
//!
//! Lenient JSON-Schema-like checking driven by the descriptor table.
//! Methods without a registered descriptor pass through untouched so
//! that new upstream methods keep working; known methods get required
//! fields, type constraints, and cross-field rules enforced. Unknown
//! extra fields are always preserved.

use serde_json::Value;

use crate::methods::{self, CrossRule, MethodDescriptor, ParamKind};

/// Validation outcome: the (possibly identical) normalised parameter
/// object, or the list of violations as dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Ok(Value),
    Invalid(Vec<String>),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok(_))
    }

    /// Violations joined for the error envelope.
    pub fn details(&self) -> String {
        match self {
            Validation::Ok(_) => String::new(),
            Validation::Invalid(details) => details.join("; "),
        }
    }
}

/// Validate `params` against the method's registered descriptor.
pub fn validate(method: &str, params: &Value) -> Validation {
    let descriptor = match methods::get(method) {
        Some(d) => d,
        // Forward compatibility: unknown methods pass through.
        None => return Validation::Ok(params.clone()),
    };

    let map = match params {
        Value::Object(map) => map,
        Value::Null => {
            // Treat absent params as an empty object.
            return validate(method, &Value::Object(serde_json::Map::new()));
        }
        _ => {
            return Validation::Invalid(vec![format!(
                "params: expected object, got {}",
                type_name(params)
            )])
        }
    };

    let mut details = Vec::new();

    for spec in descriptor.params.iter().filter(|p| p.required) {
        if !map.contains_key(spec.name) {
            details.push(format!("{}: required field missing", spec.name));
        }
    }

    for (name, value) in map {
        if let Some(spec) = descriptor.param(name) {
            check_kind(name, value, &spec.kind, &mut details);
        }
        // Unknown fields are preserved, not rejected.
    }

    check_cross_rule(descriptor, map, &mut details);

    if details.is_empty() {
        Validation::Ok(params.clone())
    } else {
        Validation::Invalid(details)
    }
}

fn check_kind(path: &str, value: &Value, kind: &ParamKind, details: &mut Vec<String>) {
    match kind {
        ParamKind::Any => {}
        ParamKind::Str => {
            if !value.is_string() {
                details.push(format!("{}: expected string, got {}", path, type_name(value)));
            }
        }
        ParamKind::Int => {
            if !value.is_i64() && !value.is_u64() {
                details.push(format!(
                    "{}: expected integer, got {}",
                    path,
                    type_name(value)
                ));
            }
        }
        ParamKind::IntRange(min, max) => match value.as_i64() {
            Some(n) if n >= *min && n <= *max => {}
            Some(n) => details.push(format!("{}: {} outside {}..{}", path, n, min, max)),
            None => details.push(format!(
                "{}: expected integer, got {}",
                path,
                type_name(value)
            )),
        },
        ParamKind::Num => {
            if !value.is_number() {
                details.push(format!("{}: expected number, got {}", path, type_name(value)));
            }
        }
        ParamKind::NumRange(min, max) => match value.as_f64() {
            Some(n) if n >= *min && n <= *max => {}
            Some(n) => details.push(format!("{}: {} outside {}..{}", path, n, min, max)),
            None => details.push(format!(
                "{}: expected number, got {}",
                path,
                type_name(value)
            )),
        },
        ParamKind::Bool => {
            if !value.is_boolean() {
                details.push(format!(
                    "{}: expected boolean, got {}",
                    path,
                    type_name(value)
                ));
            }
        }
        ParamKind::Choice(options) => match value.as_str() {
            Some(s) if options.contains(&s) => {}
            Some(s) => details.push(format!(
                "{}: \"{}\" not one of [{}]",
                path,
                s,
                options.join(", ")
            )),
            None => details.push(format!("{}: expected string, got {}", path, type_name(value))),
        },
        ParamKind::Array => {
            if !value.is_array() {
                details.push(format!("{}: expected array, got {}", path, type_name(value)));
            }
        }
        ParamKind::Object => {
            if !value.is_object() {
                details.push(format!(
                    "{}: expected object, got {}",
                    path,
                    type_name(value)
                ));
            }
        }
        ParamKind::ChatId => {
            let ok = value.is_i64() || value.is_u64() || value.is_string();
            if !ok {
                details.push(format!(
                    "{}: expected integer id or @username string, got {}",
                    path,
                    type_name(value)
                ));
            }
        }
    }
}

fn check_cross_rule(
    descriptor: &MethodDescriptor,
    map: &serde_json::Map<String, Value>,
    details: &mut Vec<String>,
) {
    match descriptor.cross_rule {
        CrossRule::None => {}
        CrossRule::ChatMessageOrInline => {
            let has_chat_pair = map.contains_key("chat_id") && map.contains_key("message_id");
            let has_inline = map.contains_key("inline_message_id");
            if !has_chat_pair && !has_inline {
                details.push(
                    "chat_id: chat_id + message_id or inline_message_id required".to_string(),
                );
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_method_passes_through() {
        let params = json!({"anything": [1, 2, 3]});
        assert_eq!(
            validate("someFutureMethod", &params),
            Validation::Ok(params)
        );
    }

    #[test]
    fn missing_required_field() {
        let result = validate("sendMessage", &json!({"chat_id": 1}));
        match result {
            Validation::Invalid(details) => {
                assert_eq!(details, vec!["text: required field missing"]);
            }
            _ => panic!("expected invalid"),
        }
    }

    #[test]
    fn multiple_violations_joined() {
        let result = validate("sendMessage", &json!({"text": 42}));
        assert!(!result.is_ok());
        let details = result.details();
        assert!(details.contains("chat_id: required field missing"));
        assert!(details.contains("text: expected string"));
        assert!(details.contains("; "));
    }

    #[test]
    fn chat_id_accepts_both_forms() {
        assert!(validate("sendMessage", &json!({"chat_id": 123, "text": "x"})).is_ok());
        assert!(validate("sendMessage", &json!({"chat_id": "@chan", "text": "x"})).is_ok());
        assert!(!validate("sendMessage", &json!({"chat_id": true, "text": "x"})).is_ok());
    }

    #[test]
    fn enum_constraint() {
        let ok = json!({"chat_id": 1, "text": "x", "parse_mode": "HTML"});
        assert!(validate("sendMessage", &ok).is_ok());

        let bad = json!({"chat_id": 1, "text": "x", "parse_mode": "BBCode"});
        let result = validate("sendMessage", &bad);
        assert!(result.details().contains("parse_mode"));
    }

    #[test]
    fn numeric_range() {
        let ok = json!({"chat_id": 1, "latitude": 48.85, "longitude": 2.35});
        assert!(validate("sendLocation", &ok).is_ok());

        let bad = json!({"chat_id": 1, "latitude": 148.85, "longitude": 2.35});
        assert!(validate("sendLocation", &bad)
            .details()
            .contains("latitude"));
    }

    #[test]
    fn unknown_fields_preserved() {
        let params = json!({"chat_id": 1, "text": "x", "future_flag": true});
        match validate("sendMessage", &params) {
            Validation::Ok(normalised) => {
                assert_eq!(normalised["future_flag"], true);
            }
            _ => panic!("expected ok"),
        }
    }

    #[test]
    fn cross_rule_edit_message() {
        // Neither form: invalid
        let result = validate("editMessageText", &json!({"text": "new"}));
        assert!(result.details().contains("inline_message_id"));

        // chat_id + message_id form
        assert!(validate(
            "editMessageText",
            &json!({"chat_id": 1, "message_id": 2, "text": "new"})
        )
        .is_ok());

        // inline form
        assert!(validate(
            "editMessageText",
            &json!({"inline_message_id": "abc", "text": "new"})
        )
        .is_ok());
    }

    #[test]
    fn null_params_treated_as_empty() {
        assert!(validate("getMe", &Value::Null).is_ok());
        assert!(!validate("sendMessage", &Value::Null).is_ok());
    }

    #[test]
    fn non_object_params_rejected_for_known_methods() {
        let result = validate("sendMessage", &json!([1, 2]));
        assert!(result.details().contains("expected object"));
    }
}
