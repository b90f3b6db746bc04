use async_trait::async_trait;
use capitol_core::normalize::govtrack::{list_page, role_to_kpi, vote_to_record};
use capitol_core::urls::{govtrack_roles_url, govtrack_votes_url};
use capitol_core::{Chamber, KpiSet, MemberKPI, VoteRecord, VoteSet, VoteWindow};
use tracing::info;

use super::{SourceContext, not_yet_open};
use crate::error::SyncError;
use crate::merge::Source;
use crate::paginate::{Page, collect};

/// Current GovTrack roles, paged `govtrack_page_size` at a time.
///
/// A legislator can hold several current roles; the candidate with the most
/// recorded votes is kept.
pub struct GovTrackRoles {
    ctx: SourceContext,
}

impl GovTrackRoles {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Source<MemberKPI> for GovTrackRoles {
    fn name(&self) -> &str {
        "govtrack"
    }

    async fn fetch(&self) -> Result<KpiSet, SyncError> {
        let base = self.ctx.config.endpoints.govtrack.as_str();
        let page_size = self.ctx.config.govtrack_page_size;

        let collected = collect(
            |offset| {
                let fetch = self.ctx.fetch.clone();
                let url = govtrack_roles_url(base, page_size, offset);
                async move {
                    let payload = fetch.get_json(&url).await?;
                    let page = list_page(&payload);
                    Ok(Page {
                        items: page.objects,
                        total: page.total_count,
                        page_size: page.limit.unwrap_or(page_size),
                    })
                }
            },
            None,
            Some(self.ctx.config.govtrack_max_pages),
        )
        .await;
        let pages = collected.pages;
        let roles = collected.into_result()?;

        let mut dropped = 0;
        let mut set = KpiSet::new();
        for role in &roles {
            match role_to_kpi(role) {
                Some(kpi) => {
                    set.insert_candidate(kpi);
                }
                None => dropped += 1,
            }
        }
        info!(pages, roles = roles.len(), members = set.len(), dropped, "govtrack roles normalized");
        Ok(set)
    }
}

/// GovTrack roll calls of one chamber inside a window, newest first.
///
/// The only Senate listing, and the last resort for the House.
pub struct GovTrackVotes {
    ctx: SourceContext,
    chamber: Chamber,
    window: VoteWindow,
    cap: usize,
}

impl GovTrackVotes {
    pub fn new(ctx: SourceContext, chamber: Chamber, window: VoteWindow, cap: usize) -> Self {
        Self {
            ctx,
            chamber,
            window,
            cap,
        }
    }
}

#[async_trait]
impl Source<VoteRecord> for GovTrackVotes {
    fn name(&self) -> &str {
        "govtrack"
    }

    async fn fetch(&self) -> Result<VoteSet, SyncError> {
        let config = &self.ctx.config;
        let base = config.endpoints.govtrack.as_str();
        let chamber = self.chamber.slug();
        let page_size = config.govtrack_page_size.min(self.cap).max(1);
        let (from, to) = (self.window.start().to_string(), self.window.end().to_string());

        let collected = collect(
            |offset| {
                let fetch = self.ctx.fetch.clone();
                let url = govtrack_votes_url(base, chamber, &from, &to, page_size, offset);
                async move {
                    let payload = fetch.get_json(&url).await?;
                    let page = list_page(&payload);
                    Ok(Page {
                        items: page.objects,
                        total: page.total_count,
                        page_size: page.limit.unwrap_or(page_size),
                    })
                }
            },
            Some(self.cap),
            Some(config.govtrack_max_pages),
        )
        .await;
        let pages = collected.pages;
        let objects = collected.into_result()?;

        let mut dropped = 0;
        let mut set = VoteSet::new();
        for obj in &objects {
            match vote_to_record(obj, self.chamber).filter(|v| self.window.contains(&v.date)) {
                Some(vote) => {
                    set.insert_candidate(vote);
                }
                None => dropped += 1,
            }
        }
        info!(chamber, window = %self.window, pages, votes = set.len(), dropped, "govtrack votes normalized");
        Ok(set)
    }

    fn empty_is_authoritative(&self) -> bool {
        not_yet_open(&self.window)
    }
}
