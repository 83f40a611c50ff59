//! Typed access to loosely-typed JSON property maps
//!
//! `null` is treated like an absent key everywhere, so operators can blank a
//! property without removing it.

use serde_json::{Map, Value};
use stratus_cloud::{CloudError, Result};

/// Display name of a JSON value's type, used in validation messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(n) if n.is_f64() => "Float",
        Value::Number(_) => "Integer",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Hash",
    }
}

fn invalid(key: &str, expected: &str, value: &Value) -> CloudError {
    CloudError::cloud(format!(
        "Invalid `{}' property: {} expected, `{}' provided",
        key,
        expected,
        type_name(value)
    ))
}

fn present<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    properties.get(key).filter(|value| !value.is_null())
}

pub fn bool_property(properties: &Map<String, Value>, key: &str, default: bool) -> Result<bool> {
    match present(properties, key) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(invalid(key, "Boolean", other)),
    }
}

pub fn string_property(properties: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match present(properties, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(key, "String", other)),
    }
}

/// An array of strings; missing means empty
pub fn string_list_property(properties: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    match present(properties, key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(invalid(key, "Array of String", other)),
            })
            .collect(),
        Some(other) => Err(invalid(key, "Array", other)),
    }
}

/// The object at `value`, or an error naming what was expected
pub fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        CloudError::cloud(format!(
            "Invalid {}: Hash expected, `{}' provided",
            what,
            type_name(value)
        ))
    })
}
