//! Live TTLs per data type.

use std::collections::HashMap;

use crate::config::CacheConfig;
use crate::data_type;

/// TTL used for tags without an entry.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Lookup table from data type tag to live TTL in seconds.
#[derive(Debug, Clone)]
pub struct TtlTable {
    ttls: HashMap<String, u64>,
    default_ttl: u64,
}

impl TtlTable {
    /// The built-in table.
    pub fn builtin() -> Self {
        let ttls = [
            (data_type::PROTOCOL_INFO, 86_400),
            (data_type::TOKEN_PRICE, 300),
            (data_type::PROTOCOL_TVL, 1_800),
            (data_type::PROTOCOL_REVENUE, 3_600),
            (data_type::ALL_PROTOCOLS, 43_200),
            (data_type::MARKET_DATA, 1_800),
            (data_type::VOLUME_DATA, 3_600),
        ]
        .into_iter()
        .map(|(tag, ttl)| (tag.to_string(), ttl))
        .collect();

        Self {
            ttls,
            default_ttl: DEFAULT_TTL_SECS,
        }
    }

    /// Built-in table with configured overrides applied. An override for
    /// `default` changes the fallback TTL.
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut table = Self::builtin();
        for (tag, ttl) in &config.ttl_overrides {
            if tag == data_type::DEFAULT {
                table.default_ttl = *ttl;
            } else {
                table.ttls.insert(tag.clone(), *ttl);
            }
        }
        table
    }

    pub fn ttl_for(&self, tag: &str) -> u64 {
        self.ttls.get(tag).copied().unwrap_or(self.default_ttl)
    }

    /// Longest TTL any tag can get, fallback included.
    pub fn max_ttl(&self) -> u64 {
        self.ttls.values().copied().fold(self.default_ttl, u64::max)
    }
}

impl Default for TtlTable {
    fn default() -> Self {
        Self::builtin()
    }
}
