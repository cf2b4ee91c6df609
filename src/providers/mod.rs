//! Provider adapters.
//!
//! Concrete upstream adapters are opaque fetch functions of the shape
//! `Fn(CancellationToken) -> Future<Output = UpstreamResult<Value>>`. The
//! generic JSON-over-HTTP provider here backs the configured warm-up targets.

pub mod http;

pub use http::HttpJsonProvider;
