//! Provider pipelines: fetch, paginate, fan out, normalize.
//!
//! Each [`Source`](crate::merge::Source) here is one provider composition
//! the orchestrator can use as a primary or a fallback.

pub mod clerk;
pub mod congress;
pub mod govtrack;
pub mod senate;

use std::sync::Arc;

use capitol_core::VoteWindow;
use chrono::Utc;
use serde_json::Value;

use crate::config::AggregatorConfig;
use crate::fetch::Fetch;

pub use clerk::ClerkRecent;
pub use congress::{CongressMemberVotes, CongressVoteListing};
pub use govtrack::{GovTrackRoles, GovTrackVotes};

/// Shared handles every pipeline needs.
#[derive(Clone)]
pub struct SourceContext {
    pub fetch: Arc<dyn Fetch>,
    pub config: Arc<AggregatorConfig>,
}

impl SourceContext {
    pub fn new(fetch: Arc<dyn Fetch>, config: Arc<AggregatorConfig>) -> Self {
        Self { fetch, config }
    }
}

/// `pagination.count` from a Congress.gov list response.
fn pagination_count(payload: &Value) -> Option<usize> {
    payload
        .pointer("/pagination/count")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
}

/// A window that has not opened yet: an empty listing for it is a real answer.
fn not_yet_open(window: &VoteWindow) -> bool {
    window.is_after(Utc::now().date_naive())
}
