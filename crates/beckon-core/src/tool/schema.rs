//! Argument schema validation
//!
//! Planned step arguments are checked against the tool's declared parameter
//! schema before anything executes. Validation fails closed: a missing
//! required field or a wrong-typed value rejects the step, it is never
//! coerced. Extra keys the schema does not mention are tolerated.

use serde_json::Value;
use std::collections::HashSet;

/// Validate a JSON argument object against a tool's parameter schema.
///
/// The schema is the usual JSON-schema object shape: `{"type": "object",
/// "properties": {...}, "required": [...]}`. A `Null` schema accepts
/// anything.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    if schema.is_null() {
        return Ok(());
    }

    let empty = serde_json::Map::new();
    let args_obj = match args {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => return Err(format!("arguments must be an object, got {}", type_name(other))),
    };

    for field in required_fields(schema) {
        if !args_obj.contains_key(&field) {
            return Err(format!("missing required field '{}'", field));
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };

    for (key, value) in args_obj {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };
        let Some(expected) = field_schema.get("type").and_then(|v| v.as_str()) else {
            continue;
        };
        if !type_matches(expected, value) {
            return Err(format!(
                "field '{}' expected {}, got {}",
                key,
                expected,
                type_name(value)
            ));
        }
    }

    Ok(())
}

fn required_fields(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect::<HashSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default()
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        // Unknown type hints are not enforced.
        _ => true,
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

    fn event_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "start": {"type": "string", "format": "date-time"},
                "end": {"type": "string", "format": "date-time"},
                "attendees": {"type": "array"},
                "all_day": {"type": "boolean"},
                "priority": {"type": "integer"}
            },
            "required": ["title", "start", "end"]
        })
    }

    #[test]
    fn test_accepts_valid_args() {
        let args = json!({
            "title": "Team standup",
            "start": "2026-08-08T14:00:00",
            "end": "2026-08-08T14:30:00",
            "attendees": ["ana@example.com"]
        });
        assert!(validate_args(&event_schema(), &args).is_ok());
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let args = json!({"title": "Team standup"});
        let err = validate_args(&event_schema(), &args).unwrap_err();
        assert!(err.contains("missing required field"));
    }

    #[test]
    fn test_rejects_wrong_type_without_coercion() {
        let args = json!({
            "title": "Team standup",
            "start": "2026-08-08T14:00:00",
            "end": "2026-08-08T14:30:00",
            "priority": "1"
        });
        let err = validate_args(&event_schema(), &args).unwrap_err();
        assert!(err.contains("'priority'"));
        assert!(err.contains("integer"));
    }

    #[test]
    fn test_tolerates_unknown_keys() {
        let args = json!({
            "title": "Team standup",
            "start": "2026-08-08T14:00:00",
            "end": "2026-08-08T14:30:00",
            "color": "blue"
        });
        assert!(validate_args(&event_schema(), &args).is_ok());
    }

    #[test]
    fn test_null_args_ok_when_nothing_required() {
        let schema = json!({
            "type": "object",
            "properties": {"list_name": {"type": "string"}},
            "required": []
        });
        assert!(validate_args(&schema, &Value::Null).is_ok());
    }

    #[test]
    fn test_non_object_args_rejected() {
        let err = validate_args(&event_schema(), &json!(["not", "an", "object"])).unwrap_err();
        assert!(err.contains("must be an object"));
    }

    #[test]
    fn test_null_schema_accepts_anything() {
        assert!(validate_args(&Value::Null, &json!({"anything": 1})).is_ok());
    }
}
