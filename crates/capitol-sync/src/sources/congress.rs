//! Congress.gov v3 pipelines.
//!
//! Attendance: roster → Bioguide/GovTrack id map → per-member vote history
//! (bounded fan-out, a few pages each) → tallies keyed by GovTrack id.
//!
//! Votes: date-range listing (paged, capped) → per-vote detail hydration
//! with retry → records. A vote whose detail never arrives still yields a
//! record from its listing entry.

use async_trait::async_trait;
use capitol_core::normalize::congress::{listing_key, pluck_vote_array, tally_member_votes, vote_to_record};
use capitol_core::normalize::roster::{IdMap, parse_roster};
use capitol_core::urls::{
    clerk_roll_url, congress_for_year, congress_member_votes_url, congress_vote_detail_url,
    congress_vote_list_url,
};
use capitol_core::{Chamber, KpiSet, MemberKPI, VoteRecord, VoteSet, VoteWindow};
use chrono::{Datelike, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{SourceContext, not_yet_open, pagination_count};
use crate::error::SyncError;
use crate::merge::Source;
use crate::paginate::{Page, collect};
use crate::pool::{Retry, WorkerPool};

fn api_key(ctx: &SourceContext) -> Result<String, SyncError> {
    ctx.config
        .congress_key()
        .map(str::to_string)
        .ok_or(SyncError::MissingCredential("Congress.gov API key"))
}

/// Attendance from each member's Congress.gov vote history.
pub struct CongressMemberVotes {
    ctx: SourceContext,
}

impl CongressMemberVotes {
    pub fn new(ctx: SourceContext) -> Self {
        Self { ctx }
    }

    async fn member_kpi(
        &self,
        key: &str,
        congress: u32,
        bioguide: &str,
        govtrack: &str,
    ) -> Result<Option<MemberKPI>, SyncError> {
        let base = self.ctx.config.endpoints.congress_api.as_str();
        let page_size = self.ctx.config.congress_page_size;

        let collected = collect(
            |offset| {
                let fetch = self.ctx.fetch.clone();
                let url = congress_member_votes_url(base, bioguide, congress, page_size, offset, key);
                async move {
                    let payload = fetch.get_json(&url).await?;
                    Ok(Page {
                        items: pluck_vote_array(&payload),
                        total: pagination_count(&payload),
                        page_size,
                    })
                }
            },
            None,
            Some(self.ctx.config.member_max_pages),
        )
        .await;
        let votes = collected.into_result()?;
        if votes.is_empty() {
            return Ok(None);
        }
        Ok(Some(tally_member_votes(govtrack, &votes)))
    }
}

#[async_trait]
impl Source<MemberKPI> for CongressMemberVotes {
    fn name(&self) -> &str {
        "congress.gov"
    }

    async fn fetch(&self) -> Result<KpiSet, SyncError> {
        let key = api_key(&self.ctx)?;
        let config = &self.ctx.config;

        let payload = self.ctx.fetch.get_json(&config.endpoints.roster).await?;
        let today = Utc::now().date_naive();
        let roster = parse_roster(&payload, today);
        let ids = IdMap::from_roster(&roster);
        let members: Vec<(String, String)> = roster
            .iter()
            .filter_map(|l| {
                let bioguide = l.bioguide.as_deref()?;
                Some((bioguide.to_string(), ids.govtrack_for(bioguide)?.to_string()))
            })
            .collect();
        if members.is_empty() {
            return Err(SyncError::Schema("roster lists no member with both ids".to_string()));
        }

        let congress = congress_for_year(today.year());
        info!(members = members.len(), congress, "fetching member vote histories");
        let per_member = config.request_timeout * config.member_max_pages as u32;
        let results = WorkerPool::new(config.member_concurrency)
            .with_timeout(per_member)
            .run(members, |(bioguide, govtrack)| {
                let key = key.as_str();
                async move { self.member_kpi(key, congress, &bioguide, &govtrack).await }
            })
            .await;

        let mut failed = 0;
        let mut set = KpiSet::new();
        for result in results {
            match result {
                Ok(Some(kpi)) => {
                    set.insert_candidate(kpi);
                }
                Ok(None) => {}
                Err(_) => failed += 1,
            }
        }
        info!(members = set.len(), failed, "member vote histories tallied");
        if set.is_empty() {
            return Err(SyncError::NoRecords {
                provider: self.name().to_string(),
            });
        }
        Ok(set)
    }
}

/// House votes inside a date window from the Congress.gov listing.
pub struct CongressVoteListing {
    ctx: SourceContext,
    window: VoteWindow,
    cap: usize,
}

impl CongressVoteListing {
    pub fn new(ctx: SourceContext, window: VoteWindow, cap: usize) -> Self {
        Self { ctx, window, cap }
    }

    async fn hydrate(&self, item: Value, key: &str, retry: &Retry) -> Option<VoteRecord> {
        let config = &self.ctx.config;
        let base = config.endpoints.congress_api.as_str();
        let Some(k) = listing_key(&item) else {
            debug!("listing entry without congress/session/roll, dropped");
            return None;
        };
        let chamber = k.chamber.slug();
        let url = congress_vote_detail_url(base, k.congress, chamber, k.session, k.roll, key);
        let detail = match retry.run("vote detail", || self.ctx.fetch.get_json(&url)).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!(roll = k.roll, error = %e, "vote detail unavailable, using listing entry");
                None
            }
        };

        let public_url = congress_vote_detail_url(base, k.congress, chamber, k.session, k.roll, "");
        let mut record = vote_to_record(&item, detail.as_ref(), vec![public_url])?;
        if record.chamber == Chamber::House {
            let clerk = clerk_roll_url(&config.endpoints.clerk, record.year(), record.roll_number);
            record.source_refs.push(clerk);
        }
        Some(record)
    }
}

#[async_trait]
impl Source<VoteRecord> for CongressVoteListing {
    fn name(&self) -> &str {
        "congress.gov"
    }

    async fn fetch(&self) -> Result<VoteSet, SyncError> {
        let key = api_key(&self.ctx)?;
        let config = &self.ctx.config;
        let base = config.endpoints.congress_api.as_str();
        let page_size = config.congress_page_size;
        let (from, to) = (self.window.start().to_string(), self.window.end().to_string());

        let collected = collect(
            |offset| {
                let fetch = self.ctx.fetch.clone();
                let url = congress_vote_list_url(base, &from, &to, page_size, offset, &key);
                async move {
                    let payload = fetch.get_json(&url).await?;
                    Ok(Page {
                        items: pluck_vote_array(&payload),
                        total: pagination_count(&payload),
                        page_size,
                    })
                }
            },
            Some(self.cap),
            None,
        )
        .await;
        let listed = collected.into_result()?;
        info!(window = %self.window, listed = listed.len(), "vote listing collected");

        let retry = Retry {
            attempts: config.hydrate_attempts,
            base: config.hydrate_backoff_base,
            step: config.hydrate_backoff_step,
        };
        let hydrated = WorkerPool::new(config.hydrate_concurrency)
            .run(listed, |item| {
                let (key, retry) = (key.as_str(), &retry);
                async move { Ok(self.hydrate(item, key, retry).await) }
            })
            .await;

        Ok(hydrated.into_iter().flatten().flatten().collect())
    }

    fn empty_is_authoritative(&self) -> bool {
        not_yet_open(&self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;
    use crate::fetch::MockFetcher;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const API: &str = "https://api.congress.gov/v3";
    const ROSTER: &str = "https://unitedstates.github.io/congress-legislators/legislators-current.json";

    fn ctx(mock: &Arc<MockFetcher>) -> SourceContext {
        let config = AggregatorConfig {
            congress_key: Some("K".into()),
            hydrate_backoff_base: Duration::from_millis(1),
            hydrate_backoff_step: Duration::ZERO,
            ..Default::default()
        };
        SourceContext::new(mock.clone(), Arc::new(config))
    }

    fn year(year: i32) -> VoteWindow {
        VoteWindow::year(year).unwrap()
    }

    fn roster() -> Value {
        json!([
            {"id": {"bioguide": "A000001", "govtrack": 400001}, "name": {"official_full": "A"},
             "terms": [{"type": "rep", "end": "2099-01-03"}]},
            {"id": {"bioguide": "B000002", "govtrack": 400002}, "name": {"official_full": "B"},
             "terms": [{"type": "rep", "end": "2099-01-03"}]},
            {"id": {"bioguide": "C000003"}, "name": {"official_full": "No GovTrack id"},
             "terms": [{"type": "sen", "end": "2099-01-03"}]}
        ])
    }

    #[tokio::test]
    async fn member_histories_are_keyed_by_govtrack_id() {
        let mock = Arc::new(MockFetcher::new());
        mock.json(ROSTER, &roster());
        mock.json(
            format!("{API}/member/A000001/votes"),
            &json!({"votes": [
                {"position": "Yea"}, {"memberPosition": "Not Voting"}, {"vote_position": "Nay"}, {"position": "Yea"}
            ]}),
        );
        mock.status(format!("{API}/member/B000002/votes"), 500);

        let set = CongressMemberVotes::new(ctx(&mock)).fetch().await.unwrap();
        assert_eq!(set.len(), 1);
        let a = set.get("400001").unwrap();
        assert_eq!((a.total_votes, a.missed_votes), (4, 1));
        assert_eq!(mock.hits_with_prefix(&format!("{API}/member/C000003")), 0);
    }

    #[tokio::test]
    async fn member_histories_need_a_key() {
        let mock = Arc::new(MockFetcher::new());
        let ctx = SourceContext::new(mock.clone(), Arc::new(AggregatorConfig::default()));
        let err = CongressMemberVotes::new(ctx).fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::MissingCredential(_)));
        assert_eq!(mock.total_hits(), 0);
    }

    #[tokio::test]
    async fn no_member_hits_is_a_failure() {
        let mock = Arc::new(MockFetcher::new());
        mock.json(ROSTER, &roster());
        mock.json(format!("{API}/member/"), &json!({"votes": []}));
        let err = CongressMemberVotes::new(ctx(&mock)).fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::NoRecords { .. }));
    }

    #[tokio::test]
    async fn listing_is_hydrated_with_exact_totals() {
        let mock = Arc::new(MockFetcher::new());
        mock.json(
            format!("{API}/vote?chamber=house"),
            &json!({"votes": [
                {"congress": 119, "sessionNumber": 1, "rollNumber": 42, "chamber": "House",
                 "date": "2025-02-12T15:30:00Z", "voteQuestionText": "On Passage"},
                {"congress": 119, "sessionNumber": 1, "rollNumber": 41, "chamber": "House",
                 "date": "2025-02-12T14:00:00Z", "voteQuestionText": "On Motion to Recommit"}
            ]}),
        );
        mock.json(
            congress_vote_detail_url(API, 119, "house", 1, 42, "K"),
            &json!({"vote": {"result": "Passed", "totals": {"yeas": 210, "nays": 200, "present": 1, "notVoting": 3}}}),
        );
        mock.status(congress_vote_detail_url(API, 119, "house", 1, 41, "K"), 503);

        let set = CongressVoteListing::new(ctx(&mock), year(2025), 200).fetch().await.unwrap();
        assert_eq!(set.len(), 2);

        let v42 = set.get("house-2025-02-12-42").unwrap();
        assert_eq!((v42.yea, v42.nay, v42.present, v42.not_voting), (210, 200, 1, 3));
        assert_eq!(v42.result, "Passed");
        assert_eq!(
            v42.source_refs,
            vec![
                "https://api.congress.gov/v3/vote/119/house/1/42?format=json".to_string(),
                "https://clerk.house.gov/evs/2025/roll042.xml".to_string(),
            ]
        );

        // Detail failed three times: the listing entry still yields a record.
        let v41 = set.get("house-2025-02-12-41").unwrap();
        assert_eq!(v41.question, "On Motion to Recommit");
        assert_eq!(v41.yea, 0);
        assert_eq!(mock.hits(&congress_vote_detail_url(API, 119, "house", 1, 41, "K")), 3);
    }

    #[tokio::test]
    async fn listing_respects_cap() {
        let mock = Arc::new(MockFetcher::new());
        let votes: Vec<Value> = (1..=10)
            .map(|n| json!({"congress": 119, "session": 1, "rollNumber": n, "date": "2025-03-01"}))
            .collect();
        mock.json(format!("{API}/vote?chamber=house"), &json!({"votes": votes}));
        mock.json(format!("{API}/vote/"), &json!({"vote": {}}));

        let set = CongressVoteListing::new(ctx(&mock), year(2025), 4).fetch().await.unwrap();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn future_years_are_authoritatively_empty() {
        let mock = Arc::new(MockFetcher::new());
        assert!(CongressVoteListing::new(ctx(&mock), year(9999), 10).empty_is_authoritative());
        assert!(!CongressVoteListing::new(ctx(&mock), year(2025), 10).empty_is_authoritative());
    }

    #[tokio::test]
    async fn listing_is_requested_for_the_window() {
        let mock = Arc::new(MockFetcher::new());
        mock.json(format!("{API}/vote?chamber=house"), &json!({"votes": []}));
        let window = VoteWindow::new(
            chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
        .unwrap();

        let set = CongressVoteListing::new(ctx(&mock), window, 50).fetch().await.unwrap();
        assert!(set.is_empty());
        let url = congress_vote_list_url(API, "2025-03-01", "2025-03-31", 250, 0, "K");
        assert_eq!(mock.hits(&url), 1);
    }

    #[tokio::test]
    async fn missing_detail_is_not_retried() {
        let mock = Arc::new(MockFetcher::new());
        mock.json(
            format!("{API}/vote?chamber=house"),
            &json!({"votes": [{"congress": 119, "session": 1, "rollNumber": 7, "date": "2025-03-01"}]}),
        );
        mock.status(congress_vote_detail_url(API, 119, "house", 1, 7, "K"), 404);

        let set = CongressVoteListing::new(ctx(&mock), year(2025), 10).fetch().await.unwrap();
        assert!(set.contains("house-2025-03-01-7"));
        assert_eq!(mock.hits(&congress_vote_detail_url(API, 119, "house", 1, 7, "K")), 1);
    }
}
