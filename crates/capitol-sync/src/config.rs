//! Aggregator configuration: provider endpoints, cache lifetimes, fan-out
//! limits and page sizes.
//!
//! Validation runs before any network activity; a bad configuration is the
//! one failure the service surfaces instead of degrading to an empty result.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} primary requires a Congress.gov API key")]
    MissingKey(&'static str),
    #[error("invalid endpoint {name}: {url}")]
    Endpoint { name: &'static str, url: String },
}

/// Base URLs for every provider. Overridable so tests and mirrors can point
/// the service elsewhere.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub roster: String,
    pub govtrack: String,
    pub congress_api: String,
    pub clerk: String,
    pub senate: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            roster: "https://unitedstates.github.io/congress-legislators/legislators-current.json"
                .to_string(),
            govtrack: "https://www.govtrack.us".to_string(),
            congress_api: "https://api.congress.gov/v3".to_string(),
            clerk: "https://clerk.house.gov".to_string(),
            senate: "https://www.senate.gov".to_string(),
        }
    }
}

/// Cache lifetime per data kind. Vote status changes by the minute; member
/// totals and individual roll documents barely change within an hour.
#[derive(Debug, Clone, Copy)]
pub struct Ttls {
    pub kpis: Duration,
    pub votes: Duration,
    pub index: Duration,
    pub roll: Duration,
}

impl Default for Ttls {
    fn default() -> Self {
        Self {
            kpis: Duration::from_secs(60 * 60),
            votes: Duration::from_secs(5 * 60),
            index: Duration::from_secs(5 * 60),
            roll: Duration::from_secs(60 * 60),
        }
    }
}

/// Which attendance provider is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KpiPrimary {
    /// Congress.gov per-member vote histories, GovTrack filling holes.
    Congress,
    /// GovTrack role totals, Congress.gov filling holes when a key is set.
    #[default]
    GovTrack,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub endpoints: Endpoints,
    pub ttls: Ttls,
    pub congress_key: Option<String>,
    pub kpi_primary: KpiPrimary,
    pub user_agent: String,
    /// Per-request timeout for every outbound fetch.
    pub request_timeout: Duration,
    /// Concurrent per-member vote-history fetches.
    pub member_concurrency: usize,
    /// Concurrent Clerk roll XML fetches for "recent" queries.
    pub recent_concurrency: usize,
    /// Concurrent Congress.gov vote detail hydrations.
    pub hydrate_concurrency: usize,
    pub govtrack_page_size: usize,
    /// Upper bound on GovTrack pages per walk, for responses without a total.
    pub govtrack_max_pages: usize,
    pub congress_page_size: usize,
    /// Pages of vote history read per member.
    pub member_max_pages: usize,
    pub hydrate_attempts: u32,
    pub hydrate_backoff_base: Duration,
    pub hydrate_backoff_step: Duration,
    /// Default cap on merged vote listings.
    pub votes_cap: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            ttls: Ttls::default(),
            congress_key: None,
            kpi_primary: KpiPrimary::default(),
            user_agent: format!("capitol/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(8),
            member_concurrency: 5,
            recent_concurrency: 8,
            hydrate_concurrency: 5,
            govtrack_page_size: 200,
            govtrack_max_pages: 10,
            congress_page_size: 250,
            member_max_pages: 3,
            hydrate_attempts: 3,
            hydrate_backoff_base: Duration::from_millis(400),
            hydrate_backoff_step: Duration::from_millis(300),
            votes_cap: 200,
        }
    }
}

impl AggregatorConfig {
    /// The Congress.gov key, if one is configured and non-blank.
    pub fn congress_key(&self) -> Option<&str> {
        self.congress_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("member_concurrency", self.member_concurrency),
            ("recent_concurrency", self.recent_concurrency),
            ("hydrate_concurrency", self.hydrate_concurrency),
            ("govtrack_page_size", self.govtrack_page_size),
            ("govtrack_max_pages", self.govtrack_max_pages),
            ("congress_page_size", self.congress_page_size),
            ("member_max_pages", self.member_max_pages),
            ("votes_cap", self.votes_cap),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero("request_timeout"));
        }
        if self.hydrate_attempts == 0 {
            return Err(ConfigError::Zero("hydrate_attempts"));
        }

        let e = &self.endpoints;
        for (name, url) in [
            ("roster", &e.roster),
            ("govtrack", &e.govtrack),
            ("congress_api", &e.congress_api),
            ("clerk", &e.clerk),
            ("senate", &e.senate),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Endpoint {
                    name,
                    url: url.clone(),
                });
            }
        }

        if self.kpi_primary == KpiPrimary::Congress && self.congress_key().is_none() {
            return Err(ConfigError::MissingKey("Congress.gov attendance"));
        }
        Ok(())
    }
}
