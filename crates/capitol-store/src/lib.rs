//! Process-lifetime state for the aggregation service: the TTL cache and
//! the in-flight request table.

pub mod cache;
pub mod inflight;

pub use cache::TtlCache;
pub use inflight::InFlight;
