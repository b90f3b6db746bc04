//! The long-lived aggregation service.
//!
//! Owns the configuration, the fetcher, one TTL cache per data kind and the
//! in-flight tables that coalesce concurrent identical queries. Cache keys
//! encode every query parameter (`kpis`, `votes:house:2025-01-01:2025-12-31:200`,
//! `idx:house:2025`, `roll:house:2025:42`, `roll:senate:119:1:7`,
//! `recent:house:2025:0:50`).
//!
//! Attendance and vote listings never fail: the merge degrades to an empty
//! set. Single-document lookups return the provider error so the HTTP layer
//! can report it.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use capitol_core::{Chamber, MemberKPI, VoteRecord, VoteWindow};
use capitol_store::{InFlight, TtlCache};
use tracing::{debug, info};

use crate::config::{AggregatorConfig, ConfigError, KpiPrimary};
use crate::error::{SharedError, SyncError};
use crate::fetch::Fetch;
use crate::merge::{Merged, Orchestrator, Source};
use crate::pool::WorkerPool;
use crate::sources::clerk::{fetch_house_roll, fetch_index};
use crate::sources::senate::fetch_senate_roll;
use crate::sources::{
    ClerkRecent, CongressMemberVotes, CongressVoteListing, GovTrackRoles, GovTrackVotes, SourceContext,
};

const KPI_KEY: &str = "kpis";

pub const RECENT_DEFAULT_LIMIT: usize = 50;
pub const RECENT_MAX_LIMIT: usize = 100;

/// `limit` for "recent" queries: missing or zero means the default, then
/// clamped to `1..=RECENT_MAX_LIMIT`.
pub fn clamp_recent_limit(limit: Option<usize>) -> usize {
    limit
        .filter(|&l| l > 0)
        .unwrap_or(RECENT_DEFAULT_LIMIT)
        .clamp(1, RECENT_MAX_LIMIT)
}

pub type KpiMerge = Merged<MemberKPI>;
pub type VoteMerge = Merged<VoteRecord>;

pub struct AggregationService {
    ctx: SourceContext,
    kpis: Arc<TtlCache<KpiMerge>>,
    votes: Arc<TtlCache<VoteMerge>>,
    index: Arc<TtlCache<Vec<u32>>>,
    rolls: Arc<TtlCache<VoteRecord>>,
    recent: TtlCache<Vec<VoteRecord>>,
    kpi_builds: InFlight<KpiMerge, Infallible>,
    vote_builds: InFlight<VoteMerge, Infallible>,
    index_fetches: InFlight<Vec<u32>, SharedError>,
    roll_fetches: InFlight<VoteRecord, SharedError>,
}

impl AggregationService {
    /// Validate `config` and build the service. Nothing touches the network
    /// until the first query.
    pub fn new(config: AggregatorConfig, fetch: Arc<dyn Fetch>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            kpi_primary = ?config.kpi_primary,
            congress_key = config.congress_key().is_some(),
            "aggregation service configured"
        );
        Ok(Self {
            ctx: SourceContext::new(fetch, Arc::new(config)),
            kpis: Arc::default(),
            votes: Arc::default(),
            index: Arc::default(),
            rolls: Arc::default(),
            recent: TtlCache::new(),
            kpi_builds: InFlight::new(),
            vote_builds: InFlight::new(),
            index_fetches: InFlight::new(),
            roll_fetches: InFlight::new(),
        })
    }

    /// Service backed by live providers over HTTP.
    #[cfg(feature = "http")]
    pub fn connect(config: AggregatorConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let fetch = crate::fetch::HttpFetcher::new(&config.user_agent, config.request_timeout)?;
        Ok(Self::new(config, Arc::new(fetch))?)
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.ctx.config
    }

    /// Merged attendance keyed by GovTrack person id.
    pub async fn kpis(&self) -> Arc<KpiMerge> {
        let ctx = self.ctx.clone();
        let built = cached(
            &self.kpis,
            &self.kpi_builds,
            KPI_KEY.to_string(),
            self.config().ttls.kpis,
            move || async move { Ok(finish(kpi_orchestrator(&ctx).run().await)) },
        )
        .await;
        match built {
            Ok(merged) => merged,
            Err(never) => match never {},
        }
    }

    /// Drop the cached attendance and build it again. Callers already
    /// waiting on a build in flight share that build instead.
    pub async fn rebuild_kpis(&self) -> Arc<KpiMerge> {
        if self.kpis.remove(KPI_KEY).is_some() {
            info!("attendance cache invalidated");
        }
        self.kpis().await
    }

    /// Merged votes of `chamber` inside `window`, at most `cap` (default from
    /// config).
    pub async fn votes(&self, chamber: Chamber, window: VoteWindow, cap: Option<usize>) -> Arc<VoteMerge> {
        let cap = cap.filter(|&c| c > 0).unwrap_or(self.config().votes_cap);
        let ctx = self.ctx.clone();
        let built = cached(
            &self.votes,
            &self.vote_builds,
            format!("votes:{}:{}:{}:{cap}", chamber.slug(), window.start(), window.end()),
            self.config().ttls.votes,
            move || async move { Ok(finish(vote_orchestrator(&ctx, chamber, window, cap).run().await)) },
        )
        .await;
        match built {
            Ok(merged) => merged,
            Err(never) => match never {},
        }
    }

    /// Roll numbers on the Clerk index for `year`, newest first.
    pub async fn house_index(&self, year: i32) -> Result<Arc<Vec<u32>>, SharedError> {
        let fetch = self.ctx.fetch.clone();
        let base = self.config().endpoints.clerk.clone();
        cached(
            &self.index,
            &self.index_fetches,
            format!("idx:house:{year}"),
            self.config().ttls.index,
            move || async move { fetch_index(fetch.as_ref(), &base, year).await.map_err(Arc::new) },
        )
        .await
    }

    pub async fn house_roll(&self, year: i32, roll: u32) -> Result<Arc<VoteRecord>, SharedError> {
        let fetch = self.ctx.fetch.clone();
        let base = self.config().endpoints.clerk.clone();
        cached(
            &self.rolls,
            &self.roll_fetches,
            format!("roll:house:{year}:{roll}"),
            self.config().ttls.roll,
            move || async move {
                fetch_house_roll(fetch.as_ref(), &base, year, roll)
                    .await
                    .map_err(Arc::new)
            },
        )
        .await
    }

    pub async fn senate_roll(
        &self,
        congress: u32,
        session: u32,
        roll: u32,
    ) -> Result<Arc<VoteRecord>, SharedError> {
        let fetch = self.ctx.fetch.clone();
        let base = self.config().endpoints.senate.clone();
        cached(
            &self.rolls,
            &self.roll_fetches,
            format!("roll:senate:{congress}:{session}:{roll}"),
            self.config().ttls.roll,
            move || async move {
                fetch_senate_roll(fetch.as_ref(), &base, congress, session, roll)
                    .await
                    .map_err(Arc::new)
            },
        )
        .await
    }

    /// A page of the Clerk index, hydrated. Rolls that fail to load are
    /// skipped; the rest keep index order. A page is cached only when every
    /// roll on it loaded.
    pub async fn house_recent(
        &self,
        year: i32,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Arc<Vec<VoteRecord>>, SharedError> {
        let limit = clamp_recent_limit(limit);
        let key = format!("recent:house:{year}:{offset}:{limit}");
        if let Some(hit) = self.recent.get(&key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let rolls = self.house_index(year).await?;
        let page: Vec<u32> = rolls.iter().skip(offset).take(limit).copied().collect();
        let requested = page.len();
        let results = WorkerPool::new(self.config().recent_concurrency)
            .with_timeout(self.config().request_timeout)
            .run(page, |roll| async move {
                self.house_roll(year, roll).await.map_err(SyncError::from)
            })
            .await;

        let votes: Vec<VoteRecord> = results
            .into_iter()
            .filter_map(Result::ok)
            .map(|v| VoteRecord::clone(&v))
            .collect();
        info!(year, offset, limit, requested, returned = votes.len(), "recent house votes");
        if votes.len() == requested {
            Ok(self.recent.set(key, votes, self.config().ttls.index))
        } else {
            Ok(Arc::new(votes))
        }
    }
}

fn finish<T>(mut merged: Merged<T>) -> Merged<T> {
    merged.mark_cached();
    merged
}

/// Serve `key` from `cache`, else join or start the computation and store
/// its successful result for `ttl`.
async fn cached<V, E, F, Fut>(
    cache: &Arc<TtlCache<V>>,
    flight: &InFlight<V, E>,
    key: String,
    ttl: Duration,
    start: F,
) -> Result<Arc<V>, E>
where
    V: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    if let Some(hit) = cache.get(&key) {
        debug!(key, "cache hit");
        return Ok(hit);
    }
    let store = {
        let cache = Arc::clone(cache);
        let key = key.clone();
        move |value: &Arc<V>| {
            debug!(key, ttl_secs = ttl.as_secs(), "cached");
            cache.set_shared(key, Arc::clone(value), ttl);
        }
    };
    flight.run_then(&key, start, store).await
}

/// GovTrack-primary or Congress.gov-primary attendance, per configuration.
/// Congress.gov joins only when a key is configured.
pub fn kpi_orchestrator(ctx: &SourceContext) -> Orchestrator<MemberKPI> {
    let govtrack: Box<dyn Source<MemberKPI>> = Box::new(GovTrackRoles::new(ctx.clone()));
    let congress: Option<Box<dyn Source<MemberKPI>>> = ctx
        .config
        .congress_key()
        .map(|_| Box::new(CongressMemberVotes::new(ctx.clone())) as Box<dyn Source<MemberKPI>>);

    match (ctx.config.kpi_primary, congress) {
        (KpiPrimary::Congress, Some(congress)) => Orchestrator::new("kpis", congress).fallback(govtrack),
        (_, Some(congress)) => Orchestrator::new("kpis", govtrack).fallback(congress),
        (_, None) => Orchestrator::new("kpis", govtrack),
    }
}

/// House: Congress.gov listing (when a key is configured), then the Clerk,
/// then GovTrack, each a full fallback for the one before. Senate: GovTrack
/// alone. Listings are not hole-filled into each other: providers key the
/// same roll call by differently-zoned dates.
pub fn vote_orchestrator(
    ctx: &SourceContext,
    chamber: Chamber,
    window: VoteWindow,
    cap: usize,
) -> Orchestrator<VoteRecord> {
    let govtrack: Box<dyn Source<VoteRecord>> = Box::new(GovTrackVotes::new(ctx.clone(), chamber, window, cap));
    if chamber == Chamber::Senate {
        return Orchestrator::new("votes", govtrack);
    }
    let clerk: Box<dyn Source<VoteRecord>> = Box::new(ClerkRecent::new(ctx.clone(), window, cap));
    let orchestrator = if ctx.config.congress_key().is_some() {
        Orchestrator::new(
            "votes",
            Box::new(CongressVoteListing::new(ctx.clone(), window, cap)),
        )
        .fallback(clerk)
    } else {
        Orchestrator::new("votes", clerk)
    };
    orchestrator.fallback(govtrack).without_hole_fill()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{MockFetcher, MockResponse};
    use crate::merge::MergeState;
    use capitol_core::urls::{clerk_index_url, clerk_roll_url, govtrack_roles_url, govtrack_votes_url};
    use serde_json::json;

    const CLERK: &str = "https://clerk.house.gov";
    const GOVTRACK: &str = "https://www.govtrack.us";

    fn service(mock: &Arc<MockFetcher>, config: AggregatorConfig) -> AggregationService {
        AggregationService::new(config, mock.clone()).unwrap()
    }

    fn year_2025() -> VoteWindow {
        VoteWindow::year(2025).unwrap()
    }

    fn roles_body() -> String {
        json!({
            "meta": {"total_count": 1, "limit": 200},
            "objects": [{"person": {"id": "X"}, "total_votes": 140, "missed_votes": 7}]
        })
        .to_string()
    }

    fn roll_xml(roll: u32) -> String {
        format!(
            "<rollcall-vote><vote-metadata><rollcall-num>{roll}</rollcall-num>\
             <action-date>14-Mar-2025</action-date><vote-result>Passed</vote-result>\
             </vote-metadata></rollcall-vote>"
        )
    }

    #[test]
    fn recent_limit_clamping() {
        assert_eq!(clamp_recent_limit(None), 50);
        assert_eq!(clamp_recent_limit(Some(0)), 50);
        assert_eq!(clamp_recent_limit(Some(7)), 7);
        assert_eq!(clamp_recent_limit(Some(500)), 100);
    }

    #[test]
    fn invalid_config_fails_before_any_fetch() {
        let mock = Arc::new(MockFetcher::new());
        let config = AggregatorConfig {
            kpi_primary: KpiPrimary::Congress,
            ..Default::default()
        };
        assert!(AggregationService::new(config, mock.clone()).is_err());
        assert_eq!(mock.total_hits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_kpi_callers_share_one_build() {
        let mock = Arc::new(MockFetcher::new());
        mock.respond(
            govtrack_roles_url(GOVTRACK, 200, 0),
            MockResponse::Delayed(Duration::from_millis(200), roles_body()),
        );
        let svc = service(&mock, AggregatorConfig::default());

        let results = futures::future::join_all((0..6).map(|_| svc.kpis())).await;
        assert_eq!(mock.total_hits(), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
        assert_eq!(results[0].report.state(), Some(MergeState::Cached));
    }

    #[tokio::test(start_paused = true)]
    async fn kpis_are_cached_until_ttl() {
        let mock = Arc::new(MockFetcher::new());
        mock.text(govtrack_roles_url(GOVTRACK, 200, 0), roles_body());
        let svc = service(&mock, AggregatorConfig::default());

        svc.kpis().await;
        svc.kpis().await;
        assert_eq!(mock.total_hits(), 1);

        tokio::time::advance(svc.config().ttls.kpis + Duration::from_secs(1)).await;
        svc.kpis().await;
        assert_eq!(mock.total_hits(), 2);
    }

    #[tokio::test]
    async fn failed_primary_falls_back_for_member() {
        let mock = Arc::new(MockFetcher::new());
        mock.status(AggregatorConfig::default().endpoints.roster, 503);
        mock.text(govtrack_roles_url(GOVTRACK, 200, 0), roles_body());
        let config = AggregatorConfig {
            kpi_primary: KpiPrimary::Congress,
            congress_key: Some("K".into()),
            ..Default::default()
        };
        let merged = service(&mock, config).kpis().await;

        let x = merged.records.get("X").unwrap();
        assert_eq!((x.total_votes, x.missed_votes), (140, 7));
        assert!((x.attendance - 0.95).abs() < 1e-12);
        assert_eq!(merged.report.primary, "congress.gov");
        assert_eq!(merged.report.contributors, vec!["govtrack"]);
    }

    #[tokio::test]
    async fn everything_down_gives_empty_kpis() {
        let mock = Arc::new(MockFetcher::new());
        let merged = service(&mock, AggregatorConfig::default()).kpis().await;
        assert!(merged.records.is_empty());
        assert_eq!(merged.report.errors.len(), 1);
    }

    #[tokio::test]
    async fn recent_pages_the_index_and_shares_roll_cache() {
        let mock = Arc::new(MockFetcher::new());
        mock.text(
            clerk_index_url(CLERK, 2025),
            r#"<p>Roll Calls 40 Thru 44</p><a href="/evs/2025/roll044.xml">44</a>"#,
        );
        for roll in [44, 43, 41, 40] {
            mock.text(clerk_roll_url(CLERK, 2025, roll), roll_xml(roll));
        }
        let svc = service(&mock, AggregatorConfig::default());

        let page = svc.house_recent(2025, Some(3), 0).await.unwrap();
        let rolls: Vec<u32> = page.iter().map(|v| v.roll_number).collect();
        assert_eq!(rolls, vec![44, 43], "roll 42 is missing and skipped");

        let page = svc.house_recent(2025, Some(2), 2).await.unwrap();
        let rolls: Vec<u32> = page.iter().map(|v| v.roll_number).collect();
        assert_eq!(rolls, vec![41]);

        let single = svc.house_roll(2025, 44).await.unwrap();
        assert_eq!(single.id, "house-2025-03-14-44");
        assert_eq!(mock.hits(&clerk_index_url(CLERK, 2025)), 1);
        assert_eq!(mock.hits(&clerk_roll_url(CLERK, 2025, 44)), 1);
    }

    #[tokio::test]
    async fn missing_roll_is_an_error() {
        let mock = Arc::new(MockFetcher::new());
        let svc = service(&mock, AggregatorConfig::default());
        let err = svc.house_roll(2025, 999).await.unwrap_err();
        assert!(matches!(*err, SyncError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn votes_without_key_come_from_the_clerk() {
        let mock = Arc::new(MockFetcher::new());
        mock.text(clerk_index_url(CLERK, 2025), "<p>Roll Calls 1 Thru 2</p>");
        mock.text(clerk_roll_url(CLERK, 2025, 1), roll_xml(1));
        mock.text(clerk_roll_url(CLERK, 2025, 2), roll_xml(2));
        let svc = service(&mock, AggregatorConfig::default());

        let merged = svc.votes(Chamber::House, year_2025(), Some(10)).await;
        assert_eq!(merged.records.len(), 2);
        assert_eq!(merged.report.primary, "clerk");
        assert_eq!(merged.report.contributors, vec!["clerk"]);

        svc.votes(Chamber::House, year_2025(), Some(10)).await;
        assert_eq!(mock.hits(&clerk_index_url(CLERK, 2025)), 1);
        assert_eq!(mock.hits_with_prefix(&format!("{GOVTRACK}/api/v2/vote")), 0);
    }

    fn govtrack_votes_body(chamber: &str) -> String {
        json!({
            "meta": {"total_count": 1, "limit": 10},
            "objects": [{"number": 12, "created": "2025-03-14T15:00:00", "chamber": chamber,
                         "question": "On Passage", "total_plus": 60, "total_minus": 40}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn clerk_outage_falls_back_to_govtrack() {
        let mock = Arc::new(MockFetcher::new());
        mock.status(clerk_index_url(CLERK, 2025), 503);
        mock.text(
            govtrack_votes_url(GOVTRACK, "house", "2025-01-01", "2025-12-31", 10, 0),
            govtrack_votes_body("house"),
        );
        let svc = service(&mock, AggregatorConfig::default());

        let merged = svc.votes(Chamber::House, year_2025(), Some(10)).await;
        assert_eq!(merged.report.primary, "clerk");
        assert_eq!(merged.report.contributors, vec!["govtrack"]);
        assert!(merged.records.contains("house-2025-03-14-12"));
    }

    #[tokio::test]
    async fn senate_votes_come_from_govtrack() {
        let mock = Arc::new(MockFetcher::new());
        mock.text(
            govtrack_votes_url(GOVTRACK, "senate", "2025-01-01", "2025-12-31", 10, 0),
            govtrack_votes_body("senate"),
        );
        let svc = service(&mock, AggregatorConfig::default());

        let merged = svc.votes(Chamber::Senate, year_2025(), Some(10)).await;
        assert_eq!(merged.report.primary, "govtrack");
        assert_eq!(merged.records.keys().collect::<Vec<_>>(), vec!["senate-2025-03-14-12"]);
        assert_eq!(mock.hits_with_prefix(CLERK), 0);
    }

    #[tokio::test]
    async fn rebuild_replaces_cached_kpis() {
        let mock = Arc::new(MockFetcher::new());
        mock.text(govtrack_roles_url(GOVTRACK, 200, 0), roles_body());
        let svc = service(&mock, AggregatorConfig::default());

        let first = svc.kpis().await;
        svc.kpis().await;
        assert_eq!(mock.total_hits(), 1);

        let rebuilt = svc.rebuild_kpis().await;
        assert_eq!(mock.total_hits(), 2);
        assert!(!Arc::ptr_eq(&first, &rebuilt));

        let again = svc.kpis().await;
        assert!(Arc::ptr_eq(&rebuilt, &again));
        assert_eq!(mock.total_hits(), 2);
    }
}
