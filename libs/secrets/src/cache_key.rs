//! Secret descriptors and canonical cache keys

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write;

use crate::ProviderKind;

/// What a caller asks for: a plain path, or a structured request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretDescriptor {
    Path(String),
    Structured(Map<String, Value>),
}

impl SecretDescriptor {
    pub fn path(path: impl Into<String>) -> Self {
        SecretDescriptor::Path(path.into())
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            SecretDescriptor::Path(path) => Some(path),
            SecretDescriptor::Structured(_) => None,
        }
    }

    /// String field of a structured descriptor; empty strings count as absent
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            SecretDescriptor::Structured(fields) => fields
                .get(name)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty()),
            SecretDescriptor::Path(_) => None,
        }
    }

    /// Deterministic rendering: object fields are emitted in sorted order at
    /// every depth, so field construction order never changes the result.
    pub fn canonical(&self) -> String {
        match self {
            SecretDescriptor::Path(path) => path.clone(),
            SecretDescriptor::Structured(fields) => {
                let mut out = String::new();
                write_object(fields, &mut out);
                out
            }
        }
    }
}

impl From<&str> for SecretDescriptor {
    fn from(path: &str) -> Self {
        SecretDescriptor::Path(path.to_string())
    }
}

impl From<Map<String, Value>> for SecretDescriptor {
    fn from(fields: Map<String, Value>) -> Self {
        SecretDescriptor::Structured(fields)
    }
}

/// Key under which the registry indexes the manager for a lookup
pub fn cache_key(kind: ProviderKind, token: &str, descriptor: &SecretDescriptor) -> String {
    format!("/{kind}/{token}/{}", descriptor.canonical())
}

fn write_object(fields: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(&fields[key], out);
    }
    out.push('}');
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(fields) => write_object(fields, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // Value's Display gives JSON escaping
    let _ = write!(out, "{}", Value::String(s.to_string()));
}
