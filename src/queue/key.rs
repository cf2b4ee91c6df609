//! Deterministic request keys.
//!
//! A key identifies one logical upstream request and doubles as the cache key
//! and the dedup key. Parameters are canonicalized (object keys sorted at
//! every depth) so field order never produces two keys for the same request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical `service:method[:params]` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    /// Build a key from a service, a method and JSON parameters.
    ///
    /// `null` and empty objects contribute nothing, so
    /// `("coingecko", "markets", {})` is simply `coingecko:markets`.
    pub fn new(service: &str, method: &str, params: &Value) -> Self {
        let mut key = format!("{service}:{method}");
        let empty = match params {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if !empty {
            key.push(':');
            write_canonical(params, &mut key);
        }
        Self(key)
    }

    /// Wrap an already-canonical key (cache administration, config).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
