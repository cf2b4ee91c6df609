//! Plausibility checks for freshly fetched values.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ValidationConfig;
use crate::data_type;
use crate::observability::metrics;
use crate::validation::rules::{as_number, DataTypeProfile, RuleRegistry};

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub reason: String,
    /// Prefer the stale shadow over the value that was checked.
    pub use_stale: bool,
}

impl ValidationVerdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: "ok".to_string(),
            use_stale: false,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: reason.into(),
            use_stale: true,
        }
    }
}

/// Result of [`merge_with_stale`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub value: Value,
    pub backfilled: Vec<String>,
}

/// Validates values against the rule registered for their data type.
#[derive(Debug, Clone)]
pub struct DataValidator {
    registry: Arc<RuleRegistry>,
}

impl DataValidator {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Validator with the built-in rules.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(RuleRegistry::builtin(config))
    }

    pub fn profile(&self, data_type: &str) -> &DataTypeProfile {
        self.registry.profile(data_type)
    }

    /// Check `new` against `previous`, the last accepted value for the same key.
    pub fn validate(&self, new: &Value, previous: Option<&Value>, data_type: &str) -> ValidationVerdict {
        if is_unavailable(new) {
            return self.reject(data_type, unavailable_reason(new));
        }

        // A previous value that was itself a fallback is no baseline.
        let previous = previous.filter(|p| !is_marked_stale(p));

        match self.registry.profile(data_type).rule.evaluate(new, previous) {
            Ok(()) => ValidationVerdict::valid(),
            Err(reason) => self.reject(data_type, reason),
        }
    }

    pub fn validate_market_data(&self, new: &Value, previous: Option<&Value>) -> ValidationVerdict {
        self.validate(new, previous, data_type::MARKET_DATA)
    }

    pub fn validate_protocol_tvl(&self, new: &Value, previous: Option<&Value>) -> ValidationVerdict {
        self.validate(new, previous, data_type::PROTOCOL_TVL)
    }

    pub fn validate_token_price(&self, new: &Value, previous: Option<&Value>) -> ValidationVerdict {
        self.validate(new, previous, data_type::TOKEN_PRICE)
    }

    fn reject(&self, data_type: &str, reason: String) -> ValidationVerdict {
        tracing::warn!(data_type, reason = %reason, "Fetched value failed validation");
        metrics::record_validation_failure(data_type);
        ValidationVerdict::invalid(reason)
    }
}

/// True for `null` and for objects an adapter marked as unavailable or
/// carrying an error.
pub fn is_unavailable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => {
            map.get("_unavailable").and_then(Value::as_bool).unwrap_or(false)
                || map.get("error").is_some_and(|e| !e.is_null())
        }
        _ => false,
    }
}

fn is_marked_stale(value: &Value) -> bool {
    value.get("_stale").and_then(Value::as_bool).unwrap_or(false)
}

fn unavailable_reason(value: &Value) -> String {
    match value.get("error") {
        Some(Value::String(msg)) => format!("upstream reported error: {msg}"),
        Some(e) if !e.is_null() => format!("upstream reported error: {e}"),
        _ => "value is missing or marked unavailable".to_string(),
    }
}

/// Fill null or zero top-level numeric fields of `new` from non-zero fields
/// of `stale`. Backfilled field names are listed in `_backfilled`.
pub fn merge_with_stale(new: &Value, stale: &Value) -> MergeResult {
    let (Some(fresh), Some(old)) = (new.as_object(), stale.as_object()) else {
        return MergeResult {
            value: new.clone(),
            backfilled: Vec::new(),
        };
    };

    let mut merged = fresh.clone();
    let mut backfilled = Vec::new();

    for (field, value) in fresh {
        if field.starts_with('_') {
            continue;
        }
        let missing = value.is_null() || value.as_f64() == Some(0.0);
        if !missing {
            continue;
        }
        if let Some(replacement) = old.get(field) {
            if as_number(replacement).is_some_and(|v| v != 0.0) {
                merged.insert(field.clone(), replacement.clone());
                backfilled.push(field.clone());
            }
        }
    }

    if !backfilled.is_empty() {
        merged.insert("_backfilled".to_string(), Value::from(backfilled.clone()));
    }

    MergeResult {
        value: Value::Object(merged),
        backfilled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> DataValidator {
        DataValidator::from_config(&ValidationConfig::default())
    }

    #[test]
    fn test_market_data_drop_beyond_threshold() {
        let v = validator();
        let verdict = v.validate_market_data(&json!({ "market_cap": 100 }), Some(&json!({ "market_cap": 10000 })));
        assert!(!verdict.is_valid);
        assert!(verdict.use_stale);

        let verdict = v.validate_market_data(
            &json!({ "market_cap": 2_000_000 }),
            Some(&json!({ "market_cap": 100_000_000 })),
        );
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("suspicious drop in market_cap"));
    }

    #[test]
    fn test_market_data_growth_from_zero_is_accepted() {
        let verdict = validator().validate_market_data(&json!({ "market_cap": 10000 }), Some(&json!({ "market_cap": 0 })));
        assert!(verdict.is_valid, "{}", verdict.reason);
    }

    #[test]
    fn test_market_data_drop_to_zero_is_rejected() {
        let verdict = validator().validate_market_data(&json!({ "market_cap": 0 }), Some(&json!({ "market_cap": 10000 })));
        assert!(!verdict.is_valid);
    }

    #[test]
    fn test_market_data_without_previous() {
        let verdict = validator().validate_market_data(&json!({ "current_price": 1 }), None);
        assert_eq!(verdict, ValidationVerdict::valid());
    }

    #[test]
    fn test_market_data_without_any_signal() {
        let verdict = validator().validate_market_data(
            &json!({ "current_price": 0, "market_cap": null }),
            None,
        );
        assert!(!verdict.is_valid);
        assert!(verdict.reason.starts_with("no signal"));
    }

    #[test]
    fn test_market_data_floor() {
        let verdict = validator().validate_market_data(&json!({ "current_price": 3.2, "market_cap": 12.0 }), None);
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("floor"));
    }

    #[test]
    fn test_market_data_negative_values_are_below_floor() {
        let v = validator();
        let verdict = v.validate_market_data(&json!({ "current_price": 1.0, "market_cap": -5e9 }), None);
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("market_cap"));

        let verdict = v.validate_market_data(&json!({ "current_price": -3.0, "market_cap": 5e9 }), None);
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("current_price"));
    }

    #[test]
    fn test_market_data_increase_threshold() {
        let v = validator();
        let prev = json!({ "current_price": 1.0 });
        assert!(v.validate_market_data(&json!({ "current_price": 10.0 }), Some(&prev)).is_valid);
        let verdict = v.validate_market_data(&json!({ "current_price": 12.0 }), Some(&prev));
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("suspicious increase"));
    }

    #[test]
    fn test_swing_skipped_when_either_side_is_null() {
        let verdict = validator().validate_market_data(
            &json!({ "current_price": 5.0, "market_cap": null }),
            Some(&json!({ "current_price": 5.1, "market_cap": 1e9 })),
        );
        assert!(verdict.is_valid, "{}", verdict.reason);
    }

    #[test]
    fn test_stale_marked_previous_is_ignored() {
        let verdict = validator().validate_market_data(
            &json!({ "current_price": 1.0 }),
            Some(&json!({ "current_price": 1000.0, "_stale": true })),
        );
        assert!(verdict.is_valid, "{}", verdict.reason);
    }

    #[test]
    fn test_protocol_tvl_rules() {
        let v = validator();
        assert!(!v.validate_protocol_tvl(&json!({ "tvl": null }), None).is_valid);
        assert!(v.validate_protocol_tvl(&json!({ "tvl": 0 }), None).is_valid);

        let verdict = v.validate_protocol_tvl(&json!({ "tvl": 0 }), Some(&json!({ "tvl": 250_000 })));
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("dropped to zero"));

        assert!(v.validate_protocol_tvl(&json!({ "tvl": 240_000 }), Some(&json!({ "tvl": 250_000 }))).is_valid);
        assert!(!v.validate_protocol_tvl(&json!({ "tvl": 5_000_000 }), Some(&json!({ "tvl": 250_000 }))).is_valid);
    }

    #[test]
    fn test_token_price_rules() {
        let v = validator();
        assert!(v.validate_token_price(&json!({ "price": 1.02 }), None).is_valid);
        assert!(!v.validate_token_price(&json!({ "price": -1 }), None).is_valid);
        assert!(!v.validate_token_price(&json!({ "price": "NaN" }), None).is_valid);
        assert!(!v.validate_token_price(&json!({}), None).is_valid);
        assert!(!v.validate_token_price(&json!({ "price": 0.01 }), Some(&json!({ "price": 1.0 }))).is_valid);
    }

    #[test]
    fn test_unknown_type_only_checks_markers() {
        let v = validator();
        assert!(v.validate(&json!({ "anything": 0 }), None, "protocol-info").is_valid);
        assert!(v.validate(&json!([1, 2, 3]), None, "all-protocols").is_valid);
        assert!(!v.validate(&Value::Null, None, "protocol-info").is_valid);
        assert!(!v.validate(&json!({ "_unavailable": true }), None, "protocol-info").is_valid);

        let verdict = v.validate(&json!({ "error": "rate limited" }), None, "protocol-info");
        assert!(!verdict.is_valid);
        assert!(verdict.reason.contains("rate limited"));
    }

    #[test]
    fn test_merge_fills_missing_metrics() {
        let merged = merge_with_stale(
            &json!({ "current_price": 2.0, "market_cap": 0, "fully_diluted_valuation": null, "name": "x" }),
            &json!({ "current_price": 1.9, "market_cap": 5e8, "fully_diluted_valuation": 0 }),
        );
        assert_eq!(merged.backfilled, vec!["market_cap".to_string()]);
        assert_eq!(merged.value["market_cap"], json!(5e8));
        assert_eq!(merged.value["current_price"], json!(2.0));
        assert!(merged.value["fully_diluted_valuation"].is_null());
        assert_eq!(merged.value["_backfilled"], json!(["market_cap"]));
    }

    #[test]
    fn test_merge_without_gaps_is_identity() {
        let new = json!({ "volume": 10 });
        let merged = merge_with_stale(&new, &json!({ "volume": 9 }));
        assert_eq!(merged.value, new);
        assert!(merged.backfilled.is_empty());
    }

    #[test]
    fn test_merge_backfills_dotted_top_level_key() {
        let merged = merge_with_stale(
            &json!({ "volume.24h": 0, "volume": 3 }),
            &json!({ "volume.24h": 7.5e6, "volume": 2 }),
        );
        assert_eq!(merged.backfilled, vec!["volume.24h".to_string()]);
        assert_eq!(merged.value["volume.24h"], json!(7.5e6));
    }
}
