//! Data validation subsystem.
//!
//! # Data Flow
//! ```text
//! fetched value + previous accepted value + data type tag
//!     → validator.rs (unavailability markers, stale-baseline filter)
//!     → rules.rs (registry lookup → rule evaluation)
//!     → ValidationVerdict { is_valid, reason, use_stale }
//! ```
//!
//! # Design Decisions
//! - Validation failures are not transport errors; they downgrade a value
//!   to "use stale" instead of aborting
//! - The swing guard compares only against the previous accepted value

pub mod rules;
pub mod validator;

pub use rules::{DataTypeProfile, RuleRegistry, ValidationRule};
pub use validator::{is_unavailable, merge_with_stale, DataValidator, MergeResult, ValidationVerdict};
