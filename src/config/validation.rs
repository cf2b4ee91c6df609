//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (warm-up targets reference existing upstreams)
//! - Validate value ranges (limits > 0, percentages in range, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::cache::TtlTable;
use crate::config::schema::GatewayConfig;

/// Upper bound for a live TTL override.
pub const MAX_TTL_SECS: u64 = 30 * 86_400;

/// Upper bound for the stale shadow's lifetime (`ttl × stale_multiplier`).
pub const MAX_STALE_TTL_SECS: u64 = 365 * 86_400;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, upstream) in &config.upstreams {
        let field = |f: &str| format!("upstreams.{name}.{f}");
        if upstream.concurrency == 0 {
            errors.push(ValidationError::new(field("concurrency"), "must be at least 1"));
        }
        if upstream.requests_per_second == 0 {
            errors.push(ValidationError::new(field("requests_per_second"), "must be at least 1"));
        }
        if upstream.max_pending == 0 {
            errors.push(ValidationError::new(field("max_pending"), "must be at least 1"));
        }
        if upstream.breaker_threshold == 0 {
            errors.push(ValidationError::new(field("breaker_threshold"), "must be at least 1"));
        }
        if upstream.timeout_ms == 0 {
            errors.push(ValidationError::new(field("timeout_ms"), "must be greater than 0"));
        }
        if upstream.base_delay_ms > upstream.max_delay_ms {
            errors.push(ValidationError::new(
                field("base_delay_ms"),
                "must not exceed max_delay_ms",
            ));
        }
    }

    if config.cache.stale_multiplier == 0 {
        errors.push(ValidationError::new("cache.stale_multiplier", "must be at least 1"));
    }
    for (tag, ttl) in &config.cache.ttl_overrides {
        if *ttl == 0 || *ttl > MAX_TTL_SECS {
            errors.push(ValidationError::new(
                format!("cache.ttl_overrides.{tag}"),
                format!("must be in 1..={MAX_TTL_SECS} seconds"),
            ));
        }
    }
    let longest_stale = TtlTable::from_config(&config.cache)
        .max_ttl()
        .min(MAX_TTL_SECS)
        .checked_mul(config.cache.stale_multiplier);
    if longest_stale.map_or(true, |ttl| ttl > MAX_STALE_TTL_SECS) {
        errors.push(ValidationError::new(
            "cache.stale_multiplier",
            format!("longest stale TTL must not exceed {MAX_STALE_TTL_SECS} seconds"),
        ));
    }

    let v = &config.validation;
    if !(v.max_drop_pct > 0.0 && v.max_drop_pct <= 100.0) {
        errors.push(ValidationError::new("validation.max_drop_pct", "must be in (0, 100]"));
    }
    if v.max_increase_pct <= 0.0 {
        errors.push(ValidationError::new("validation.max_increase_pct", "must be positive"));
    }
    if v.min_market_cap < 0.0 || v.min_price < 0.0 || v.tvl_materiality_floor < 0.0 {
        errors.push(ValidationError::new("validation", "floors must not be negative"));
    }

    if config.admin.enabled {
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "not a socket address"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if config.warmup.enabled && config.warmup.interval_secs == 0 {
        errors.push(ValidationError::new("warmup.interval_secs", "must be greater than 0"));
    }
    for (i, target) in config.warmup.targets.iter().enumerate() {
        if !config.upstreams.contains_key(&target.upstream) {
            errors.push(ValidationError::new(
                format!("warmup.targets[{i}].upstream"),
                format!("unknown upstream '{}'", target.upstream),
            ));
        }
        match url::Url::parse(&target.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                format!("warmup.targets[{i}].url"),
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                format!("warmup.targets[{i}].url"),
                e.to_string(),
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
