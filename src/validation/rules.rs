//! Validation rule records and the per-data-type registry.
//!
//! A rule is plain data: which fields must exist, which must carry some
//! signal, floors, and swing thresholds. Supporting a new data type means
//! registering a new [`DataTypeProfile`], not adding a code path.

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::config::ValidationConfig;
use crate::data_type;

/// Plausibility rule for one data type.
#[derive(Debug, Clone, Default)]
pub struct ValidationRule {
    /// Must be present and numeric.
    pub required: Vec<String>,
    /// At least one must be a non-zero number.
    pub any_signal: Vec<String>,
    /// Present non-zero values below the floor are rejected, negatives included.
    pub floors: Vec<(String, f64)>,
    pub non_negative: Vec<String>,
    /// Rejected when the previous value exceeded `materiality_floor` and the
    /// new value is exactly zero.
    pub zero_guard: Vec<String>,
    pub materiality_floor: f64,
    /// Compared against the previous value.
    pub swing_fields: Vec<String>,
    pub max_drop_pct: f64,
    pub max_increase_pct: f64,
}

impl ValidationRule {
    /// Check `new` against this rule. `previous` is the last accepted value,
    /// already filtered of stale-marked values by the caller.
    pub fn evaluate(&self, new: &Value, previous: Option<&Value>) -> Result<(), String> {
        for field in &self.required {
            if lookup_number(new, field).is_none() {
                return Err(format!("{field} is missing or not a number"));
            }
        }

        for field in &self.non_negative {
            if let Some(v) = lookup_number(new, field) {
                if v < 0.0 {
                    return Err(format!("{field} is negative ({v})"));
                }
            }
        }

        if !self.any_signal.is_empty()
            && self
                .any_signal
                .iter()
                .all(|f| lookup_number(new, f).map_or(true, |v| v == 0.0))
        {
            return Err(format!(
                "no signal: {} all null or zero",
                self.any_signal.join(", ")
            ));
        }

        for (field, floor) in &self.floors {
            if let Some(v) = lookup_number(new, field) {
                if v != 0.0 && v < *floor {
                    return Err(format!("{field} {v} is below plausibility floor {floor}"));
                }
            }
        }

        let Some(previous) = previous else {
            return Ok(());
        };

        for field in &self.zero_guard {
            if let (Some(new_v), Some(old_v)) =
                (lookup_number(new, field), lookup_number(previous, field))
            {
                if new_v == 0.0 && old_v > self.materiality_floor {
                    return Err(format!("{field} dropped to zero from {old_v}"));
                }
            }
        }

        for field in &self.swing_fields {
            let (Some(new_v), Some(old_v)) =
                (lookup_number(new, field), lookup_number(previous, field))
            else {
                continue;
            };
            if old_v == 0.0 {
                continue;
            }
            let change_pct = (new_v - old_v) / old_v * 100.0;
            if change_pct < -self.max_drop_pct {
                return Err(format!(
                    "suspicious drop in {field}: {change_pct:.1}% ({old_v} -> {new_v})"
                ));
            }
            if change_pct > self.max_increase_pct {
                return Err(format!(
                    "suspicious increase in {field}: {change_pct:.1}% ({old_v} -> {new_v})"
                ));
            }
        }

        Ok(())
    }
}

/// Everything the gateway knows about one data type beyond its TTL.
#[derive(Debug, Clone)]
pub struct DataTypeProfile {
    pub rule: ValidationRule,
    /// Zero-valued stand-in returned when nothing better is available.
    pub default_value: Value,
    /// Fill null/zero fields of fresh values from the stale shadow.
    pub backfill: bool,
}

impl Default for DataTypeProfile {
    fn default() -> Self {
        Self {
            rule: ValidationRule::default(),
            default_value: Value::Object(Map::new()),
            backfill: false,
        }
    }
}

/// Data type tag → profile.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    profiles: HashMap<String, DataTypeProfile>,
    fallback: DataTypeProfile,
}

impl RuleRegistry {
    /// Registry with no data-type specific rules.
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
            fallback: DataTypeProfile::default(),
        }
    }

    /// The built-in market-data, protocol-tvl, token-price and volume-data
    /// profiles, parameterized by `config`.
    pub fn builtin(config: &ValidationConfig) -> Self {
        let mut registry = Self::empty();
        let swing = |fields: &[&str]| ValidationRule {
            swing_fields: strings(fields),
            max_drop_pct: config.max_drop_pct,
            max_increase_pct: config.max_increase_pct,
            ..ValidationRule::default()
        };

        let market_fields = ["current_price", "market_cap", "fully_diluted_valuation"];
        registry.register(
            data_type::MARKET_DATA,
            DataTypeProfile {
                rule: ValidationRule {
                    any_signal: strings(&market_fields),
                    floors: vec![
                        ("market_cap".to_string(), config.min_market_cap),
                        ("current_price".to_string(), config.min_price),
                    ],
                    ..swing(&market_fields)
                },
                default_value: json!({
                    "current_price": 0,
                    "market_cap": 0,
                    "fully_diluted_valuation": 0,
                }),
                backfill: true,
            },
        );

        registry.register(
            data_type::PROTOCOL_TVL,
            DataTypeProfile {
                rule: ValidationRule {
                    required: strings(&["tvl"]),
                    zero_guard: strings(&["tvl"]),
                    materiality_floor: config.tvl_materiality_floor,
                    ..swing(&["tvl"])
                },
                default_value: json!({ "tvl": 0 }),
                backfill: false,
            },
        );

        registry.register(
            data_type::TOKEN_PRICE,
            DataTypeProfile {
                rule: ValidationRule {
                    required: strings(&["price"]),
                    non_negative: strings(&["price"]),
                    ..swing(&["price"])
                },
                default_value: json!({ "price": 0 }),
                backfill: false,
            },
        );

        registry.register(
            data_type::VOLUME_DATA,
            DataTypeProfile {
                backfill: true,
                ..DataTypeProfile::default()
            },
        );

        registry
    }

    /// Add or replace the profile for `tag`.
    pub fn register(&mut self, tag: impl Into<String>, profile: DataTypeProfile) {
        self.profiles.insert(tag.into(), profile);
    }

    /// Profile for `tag`, or the marker-only fallback.
    pub fn profile(&self, tag: &str) -> &DataTypeProfile {
        self.profiles.get(tag).unwrap_or(&self.fallback)
    }
}

fn strings(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// Numeric value at a dotted `path`; numeric strings count as numbers.
pub fn lookup_number(value: &Value, path: &str) -> Option<f64> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    as_number(current)
}

/// `value` as a finite number; numeric strings count as numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
