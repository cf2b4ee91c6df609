//! Caching subsystem.
//!
//! # Data Flow
//! ```text
//! read:  tiered.rs get(key) → store.rs get → deserialize CacheEntry
//!        (on live miss) get_stale(key) → "key:stale"
//! write: tiered.rs set_with_smart_ttl → ttl.rs lookup → stale + live set_ex
//! ```
//!
//! # Design Decisions
//! - Availability over strict correctness: store errors read as misses
//! - The store only needs get / set-with-expiry / delete / flush

pub mod store;
pub mod tiered;
pub mod ttl;

pub use store::{KvStore, MemoryStore, StoreError};
pub use tiered::{stale_key, CacheEntry, StaleEntry, TieredCache};
pub use ttl::TtlTable;
