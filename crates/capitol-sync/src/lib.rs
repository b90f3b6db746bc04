//! Provider plumbing and aggregation: fetch seam, bounded fan-out,
//! pagination, provider pipelines, primary/fallback merging, and the
//! long-lived service that caches and coalesces it all.

pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod paginate;
pub mod pool;
pub mod service;
pub mod sources;

pub use config::{AggregatorConfig, ConfigError, Endpoints, KpiPrimary, Ttls};
pub use error::{SharedError, SyncError};
pub use fetch::Fetch;
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
#[cfg(any(test, feature = "mock"))]
pub use fetch::{MockFetcher, MockResponse};
pub use merge::{MergeReport, MergeState, Merged, Orchestrator, Source};
pub use service::{AggregationService, KpiMerge, VoteMerge};
