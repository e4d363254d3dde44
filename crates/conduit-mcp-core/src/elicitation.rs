//! Validation of elicitation schemas and submitted content.
//!
//! MCP restricts elicitation schemas to flat objects of primitive
//! properties. Both functions return the full list of violations instead of
//! failing fast: the server is authoritative over what it will accept, so
//! callers typically log the violations and proceed, but they must be
//! surfaced.

use regex::Regex;
use serde_json::Value;

const ALLOWED_PROPERTY_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array"];
const ALLOWED_STRING_FORMATS: &[&str] = &["email", "uri", "date", "date-time"];

/// Validate a server-sent `requestedSchema` against the flat-object rules.
pub fn validate_schema(schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = schema.as_object() else {
        return vec!["schema must be a JSON object".to_string()];
    };

    if obj.get("type").and_then(Value::as_str) != Some("object") {
        errors.push("schema top-level type must be 'object'".to_string());
    }

    let Some(properties) = obj.get("properties").and_then(Value::as_object) else {
        return errors;
    };

    for (name, prop) in properties {
        let Some(prop_obj) = prop.as_object() else {
            errors.push(format!("property '{name}' must be a schema object"));
            continue;
        };
        let Some(prop_type) = prop_obj.get("type").and_then(Value::as_str) else {
            errors.push(format!("property '{name}' is missing a type"));
            continue;
        };

        if prop_type == "object" {
            errors.push(format!("property '{name}': nested objects are not allowed"));
            continue;
        }
        if !ALLOWED_PROPERTY_TYPES.contains(&prop_type) {
            errors.push(format!(
                "property '{name}' has unsupported type '{prop_type}'"
            ));
            continue;
        }

        match prop_type {
            "string" => validate_string_schema(name, prop_obj, &mut errors),
            "array" => validate_array_schema(name, prop_obj, &mut errors),
            _ => {}
        }
    }

    errors
}

fn validate_string_schema(
    name: &str,
    prop: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
) {
    if let Some(format) = prop.get("format").and_then(Value::as_str) {
        if !ALLOWED_STRING_FORMATS.contains(&format) {
            errors.push(format!(
                "property '{name}' has unsupported format '{format}'"
            ));
        }
    }
    if let Some(pattern) = prop.get("pattern").and_then(Value::as_str) {
        if Regex::new(pattern).is_err() {
            errors.push(format!(
                "property '{name}' has an invalid pattern '{pattern}'"
            ));
        }
    }
    if let Some(enum_values) = prop.get("enum") {
        match enum_values.as_array() {
            Some(values) if values.iter().all(Value::is_string) => {}
            _ => errors.push(format!(
                "property '{name}' enum must be an array of strings"
            )),
        }
    }
}

fn validate_array_schema(
    name: &str,
    prop: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
) {
    // Arrays are only allowed as multi-selects over a closed set of strings.
    if allowed_array_values(prop).is_none() {
        errors.push(format!(
            "property '{name}': arrays must be multi-selects whose items carry an enum or an anyOf of const strings"
        ));
    }
}

/// The closed set of values a multi-select array accepts, if the property is
/// a well-formed multi-select.
fn allowed_array_values(prop: &serde_json::Map<String, Value>) -> Option<Vec<String>> {
    let items = prop.get("items")?.as_object()?;

    if let Some(enum_values) = items.get("enum").and_then(Value::as_array) {
        let values: Option<Vec<String>> = enum_values
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        return values;
    }

    if let Some(any_of) = items.get("anyOf").and_then(Value::as_array) {
        let values: Option<Vec<String>> = any_of
            .iter()
            .map(|variant| {
                variant
                    .get("const")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();
        return values;
    }

    None
}

/// Validate client-assembled content against a `requestedSchema`.
pub fn validate_content(content: &Value, schema: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(content_obj) = content.as_object() else {
        return vec!["content must be a JSON object".to_string()];
    };
    let Some(schema_obj) = schema.as_object() else {
        return vec!["schema must be a JSON object".to_string()];
    };

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !content_obj.contains_key(key) {
                errors.push(format!("required field '{key}' is missing"));
            }
        }
    }

    let empty = serde_json::Map::new();
    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (name, value) in content_obj {
        let Some(prop) = properties.get(name).and_then(Value::as_object) else {
            continue;
        };
        let Some(prop_type) = prop.get("type").and_then(Value::as_str) else {
            continue;
        };
        match prop_type {
            "string" => validate_string_value(name, value, prop, &mut errors),
            "number" | "integer" => {
                validate_numeric_value(name, value, prop, prop_type, &mut errors)
            }
            "boolean" => {
                if !value.is_boolean() {
                    errors.push(format!("field '{name}' must be a boolean"));
                }
            }
            "array" => validate_array_value(name, value, prop, &mut errors),
            _ => {}
        }
    }

    errors
}

fn validate_string_value(
    name: &str,
    value: &Value,
    prop: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
) {
    let Some(s) = value.as_str() else {
        errors.push(format!("field '{name}' must be a string"));
        return;
    };

    let enum_members = prop
        .get("enum")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .or_else(|| {
            // Some servers express a closed set as oneOf of consts.
            prop.get("oneOf").and_then(Value::as_array).map(|variants| {
                variants
                    .iter()
                    .filter_map(|v| v.get("const").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
        });
    if let Some(members) = enum_members {
        if !members.iter().any(|m| m == s) {
            errors.push(format!(
                "field '{name}' value '{s}' is not one of the allowed enum values [{}]",
                members.join(", ")
            ));
        }
    }

    if let Some(pattern) = prop.get("pattern").and_then(Value::as_str) {
        if let Ok(re) = Regex::new(pattern) {
            if !re.is_match(s) {
                errors.push(format!(
                    "field '{name}' value does not match pattern '{pattern}'"
                ));
            }
        }
    }

    if let Some(min) = prop.get("minLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) < min {
            errors.push(format!("field '{name}' is shorter than minLength {min}"));
        }
    }
    if let Some(max) = prop.get("maxLength").and_then(Value::as_u64) {
        if (s.chars().count() as u64) > max {
            errors.push(format!("field '{name}' is longer than maxLength {max}"));
        }
    }
}

fn validate_numeric_value(
    name: &str,
    value: &Value,
    prop: &serde_json::Map<String, Value>,
    prop_type: &str,
    errors: &mut Vec<String>,
) {
    let Some(n) = value.as_f64() else {
        errors.push(format!("field '{name}' must be a number"));
        return;
    };
    if prop_type == "integer" && value.as_i64().is_none() && value.as_u64().is_none() {
        errors.push(format!("field '{name}' must be an integer"));
    }
    if let Some(min) = prop.get("minimum").and_then(Value::as_f64) {
        if n < min {
            errors.push(format!("field '{name}' is below minimum {min}"));
        }
    }
    if let Some(max) = prop.get("maximum").and_then(Value::as_f64) {
        if n > max {
            errors.push(format!("field '{name}' is above maximum {max}"));
        }
    }
}

fn validate_array_value(
    name: &str,
    value: &Value,
    prop: &serde_json::Map<String, Value>,
    errors: &mut Vec<String>,
) {
    let Some(items) = value.as_array() else {
        errors.push(format!("field '{name}' must be an array"));
        return;
    };

    if let Some(min) = prop.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            errors.push(format!("field '{name}' has fewer than minItems {min}"));
        }
    }
    if let Some(max) = prop.get("maxItems").and_then(Value::as_u64) {
        if (items.len() as u64) > max {
            errors.push(format!("field '{name}' has more than maxItems {max}"));
        }
    }

    if let Some(allowed) = allowed_array_values(prop) {
        for item in items {
            match item.as_str() {
                Some(s) if allowed.iter().any(|a| a == s) => {}
                Some(s) => errors.push(format!(
                    "field '{name}' member '{s}' is not one of the allowed values [{}]",
                    allowed.join(", ")
                )),
                None => errors.push(format!("field '{name}' members must be strings")),
            }
        }
    }
}
