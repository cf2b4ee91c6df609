//! Tagged result of a safe fetch.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// What a safe fetch produced. Every variant carries a renderable value.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Served from the live cache tier.
    Cached(Value),
    /// Fetched, validated and cached just now.
    Fresh(Value),
    /// Upstream failed or returned implausible data; the stale shadow is served.
    Stale {
        value: Value,
        cached_at: DateTime<Utc>,
        reason: String,
    },
    /// Nothing usable anywhere; the data type's zero-valued default.
    Unavailable { value: Value, reason: String },
}

impl FetchOutcome {
    pub fn value(&self) -> &Value {
        match self {
            Self::Cached(value) | Self::Fresh(value) => value,
            Self::Stale { value, .. } | Self::Unavailable { value, .. } => value,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached(_) => "cached",
            Self::Fresh(_) => "fresh",
            Self::Stale { .. } => "stale",
            Self::Unavailable { .. } => "unavailable",
        }
    }

    /// True for stale and unavailable outcomes.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Stale { .. } | Self::Unavailable { .. })
    }

    /// Render for JSON consumers: degraded values are flagged with
    /// `_stale` / `_unavailable`. Non-object values are wrapped as `data`.
    pub fn into_json(self) -> Value {
        match self {
            Self::Cached(value) | Self::Fresh(value) => value,
            Self::Stale {
                value,
                cached_at,
                reason,
            } => {
                let mut map = into_object(value);
                map.insert("_stale".into(), Value::Bool(true));
                map.insert("_cached_at".into(), Value::String(cached_at.to_rfc3339()));
                map.insert("_stale_reason".into(), Value::String(reason));
                Value::Object(map)
            }
            Self::Unavailable { value, reason } => {
                let mut map = into_object(value);
                map.insert("_unavailable".into(), Value::Bool(true));
                map.insert("error".into(), Value::String(reason));
                Value::Object(map)
            }
        }
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stale_is_flagged() {
        let outcome = FetchOutcome::Stale {
            value: json!({ "tvl": 10 }),
            cached_at: Utc::now(),
            reason: "timeout".into(),
        };
        assert!(outcome.is_degraded());
        let rendered = outcome.into_json();
        assert_eq!(rendered["_stale"], json!(true));
        assert_eq!(rendered["tvl"], json!(10));
        assert_eq!(rendered["_stale_reason"], json!("timeout"));
    }

    #[test]
    fn test_unavailable_wraps_scalars() {
        let outcome = FetchOutcome::Unavailable {
            value: json!(0),
            reason: "circuit open".into(),
        };
        let rendered = outcome.into_json();
        assert_eq!(rendered, json!({ "data": 0, "_unavailable": true, "error": "circuit open" }));
    }

    #[test]
    fn test_fresh_is_untouched() {
        let outcome = FetchOutcome::Fresh(json!([1, 2]));
        assert_eq!(outcome.label(), "fresh");
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.into_json(), json!([1, 2]));
    }
}
