//! House Clerk: the year index page and per-roll XML documents.

use async_trait::async_trait;
use capitol_core::normalize::clerk::house_vote_from_xml;
use capitol_core::urls::{clerk_index_url, clerk_roll_url};
use capitol_core::vote::sort_newest_first;
use capitol_core::{VoteRecord, VoteSet, VoteWindow, resolve_roll_numbers};
use tracing::{info, warn};

use super::{SourceContext, not_yet_open};
use crate::error::SyncError;
use crate::fetch::Fetch;
use crate::merge::Source;
use crate::pool::WorkerPool;

/// Roll numbers listed on the Clerk index for `year`, newest first.
pub async fn fetch_index(fetch: &dyn Fetch, base: &str, year: i32) -> Result<Vec<u32>, SyncError> {
    let html = fetch.get_text(&clerk_index_url(base, year)).await?;
    let rolls = resolve_roll_numbers(&html);
    info!(year, rolls = rolls.len(), "clerk index resolved");
    Ok(rolls)
}

/// One House roll call from its Clerk XML document.
pub async fn fetch_house_roll(
    fetch: &dyn Fetch,
    base: &str,
    year: i32,
    roll: u32,
) -> Result<VoteRecord, SyncError> {
    let url = clerk_roll_url(base, year, roll);
    let xml = fetch.get_text(&url).await?;
    house_vote_from_xml(&xml, &url)
        .ok_or_else(|| SyncError::Schema(format!("{url} is not a roll-call document")))
}

/// The newest `cap` House roll calls inside a window, read straight from the
/// Clerk. Used when Congress.gov is unavailable or unconfigured.
///
/// Each year the window touches is read newest roll first, a batch at a
/// time, until `cap` records are in hand or a batch reaches back past the
/// window's first day. A year whose index cannot be read is skipped; the
/// source fails only when no index could be read at all.
pub struct ClerkRecent {
    ctx: SourceContext,
    window: VoteWindow,
    cap: usize,
}

impl ClerkRecent {
    pub fn new(ctx: SourceContext, window: VoteWindow, cap: usize) -> Self {
        Self { ctx, window, cap }
    }
}

#[async_trait]
impl Source<VoteRecord> for ClerkRecent {
    fn name(&self) -> &str {
        "clerk"
    }

    async fn fetch(&self) -> Result<VoteSet, SyncError> {
        let config = &self.ctx.config;
        let base = config.endpoints.clerk.as_str();
        let fetch = self.ctx.fetch.as_ref();
        let pool = WorkerPool::new(config.recent_concurrency).with_timeout(config.request_timeout);
        let batch = self.cap.max(pool.limit());

        let mut set = VoteSet::new();
        let mut indexed = 0;
        let mut index_error = None;
        'years: for year in self.window.years_newest_first() {
            let rolls = match fetch_index(fetch, base, year).await {
                Ok(rolls) => rolls,
                Err(e) => {
                    warn!(year, error = %e, "clerk index unavailable, skipping year");
                    index_error = Some(e);
                    continue;
                }
            };
            indexed += 1;
            for chunk in rolls.chunks(batch) {
                let results = pool
                    .run(chunk.to_vec(), |roll| fetch_house_roll(fetch, base, year, roll))
                    .await;
                let mut votes: Vec<VoteRecord> = results.into_iter().flatten().collect();
                let reached_start = votes.iter().any(|v| v.date.date_naive() < self.window.start());
                votes.retain(|v| self.window.contains(&v.date));
                sort_newest_first(&mut votes);
                let room = self.cap.saturating_sub(set.len());
                for vote in votes.into_iter().take(room) {
                    set.insert_candidate(vote);
                }
                if set.len() >= self.cap {
                    break 'years;
                }
                if reached_start {
                    break;
                }
            }
        }
        info!(window = %self.window, indexed, votes = set.len(), "clerk votes collected");
        match index_error {
            Some(e) if indexed == 0 => Err(e),
            _ => Ok(set),
        }
    }

    fn empty_is_authoritative(&self) -> bool {
        not_yet_open(&self.window)
    }
}
