//! Data type tags.
//!
//! A tag selects the cache TTL, the validation rule and the zero-valued
//! default for a fetched value. Tags are plain strings so new data types can
//! be introduced from configuration.

pub const PROTOCOL_INFO: &str = "protocol-info";
pub const TOKEN_PRICE: &str = "token-price";
pub const PROTOCOL_TVL: &str = "protocol-tvl";
pub const PROTOCOL_REVENUE: &str = "protocol-revenue";
pub const ALL_PROTOCOLS: &str = "all-protocols";
pub const MARKET_DATA: &str = "market-data";
pub const VOLUME_DATA: &str = "volume-data";
pub const DEFAULT: &str = "default";
