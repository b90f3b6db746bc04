//! `capitol` - roll-call and attendance aggregation from the command line.
//!
//! Every data subcommand builds a one-shot [`AggregationService`] and prints
//! a table (or JSON with `--json`); `serve` keeps one service alive behind
//! the HTTP proxy so its caches and request coalescing pay off.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use capitol_core::vote::sort_newest_first;
use capitol_core::{Chamber, VoteWindow};
use capitol_sync::{AggregationService, AggregatorConfig, KpiPrimary};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod display;
mod server;

#[derive(Parser, Debug)]
#[command(name = "capitol")]
#[command(about = "Congressional roll-call votes and member attendance")]
#[command(version)]
struct Cli {
    /// Congress.gov API key; enables the Congress.gov providers
    #[arg(long, env = "CAPITOL_CONGRESS_KEY", global = true, hide_env_values = true)]
    congress_key: Option<String>,

    /// Authoritative attendance provider
    #[arg(long, value_enum, default_value_t = Primary::Govtrack, env = "CAPITOL_KPI_PRIMARY", global = true)]
    kpi_primary: Primary,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "8", env = "CAPITOL_TIMEOUT_SECS", global = true)]
    timeout_secs: u64,

    #[arg(long, env = "CAPITOL_CLERK_BASE", global = true)]
    clerk_base: Option<String>,

    #[arg(long, env = "CAPITOL_SENATE_BASE", global = true)]
    senate_base: Option<String>,

    #[arg(long, env = "CAPITOL_GOVTRACK_BASE", global = true)]
    govtrack_base: Option<String>,

    #[arg(long, env = "CAPITOL_CONGRESS_BASE", global = true)]
    congress_base: Option<String>,

    #[arg(long, env = "CAPITOL_ROSTER_URL", global = true)]
    roster_url: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Primary {
    Govtrack,
    Congress,
}

impl From<Primary> for KpiPrimary {
    fn from(p: Primary) -> Self {
        match p {
            Primary::Govtrack => KpiPrimary::GovTrack,
            Primary::Congress => KpiPrimary::Congress,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the JSON proxy
    Serve {
        #[arg(short, long, default_value = "5050", env = "CAPITOL_PORT")]
        port: u16,
    },
    /// Merged member attendance
    Kpis {
        /// Rows to print, worst attendance first
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Merged votes for a year or a date window
    Votes {
        /// house or senate
        #[arg(long, default_value = "house")]
        chamber: Chamber,
        /// Whole year to list when no --from/--to is given
        #[arg(short, long)]
        year: Option<i32>,
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Maximum votes to collect
        #[arg(short, long)]
        cap: Option<usize>,
    },
    /// Roll numbers on the Clerk's yearly index
    Index {
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// A page of the most recent House votes
    Recent {
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },
    /// One House roll call
    Roll {
        #[arg(short, long)]
        year: i32,
        roll: u32,
    },
    /// One Senate roll call
    SenateRoll {
        #[arg(short, long)]
        congress: u32,
        #[arg(short, long)]
        session: u32,
        roll: u32,
    },
}

impl Cli {
    fn config(&self) -> AggregatorConfig {
        let mut config = AggregatorConfig {
            congress_key: self.congress_key.clone(),
            kpi_primary: self.kpi_primary.into(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..AggregatorConfig::default()
        };
        let endpoints = &mut config.endpoints;
        for (value, slot) in [
            (&self.clerk_base, &mut endpoints.clerk),
            (&self.senate_base, &mut endpoints.senate),
            (&self.govtrack_base, &mut endpoints.govtrack),
            (&self.congress_base, &mut endpoints.congress_api),
            (&self.roster_url, &mut endpoints.roster),
        ] {
            if let Some(v) = value {
                *slot = v.trim_end_matches('/').to_string();
            }
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let service = Arc::new(
        AggregationService::connect(cli.config()).context("Failed to configure providers")?,
    );
    let this_year = Utc::now().year();

    match cli.command {
        Commands::Serve { port } => serve(service, port).await?,
        Commands::Kpis { limit } => {
            let merged = service.kpis().await;
            if cli.json {
                print_json(&*merged)?;
            } else {
                display::print_report(&merged.report);
                display::print_kpi_table(&merged.records, limit);
            }
        }
        Commands::Votes {
            chamber,
            year,
            from,
            to,
            cap,
        } => {
            let window = VoteWindow::resolve(from, to, year.unwrap_or(this_year))
                .context("--from must not be after --to")?;
            let merged = service.votes(chamber, window, cap).await;
            let mut votes = merged.records.clone().into_values();
            sort_newest_first(&mut votes);
            if cli.json {
                print_json(&votes)?;
            } else {
                display::print_report(&merged.report);
                display::print_vote_table(&votes);
            }
        }
        Commands::Index { year } => {
            let year = year.unwrap_or(this_year);
            let rolls = service
                .house_index(year)
                .await
                .with_context(|| format!("Failed to read the {year} House index"))?;
            if cli.json {
                print_json(&*rolls)?;
            } else {
                println!("{} roll calls in {year}", rolls.len());
                let line: Vec<String> = rolls.iter().map(u32::to_string).collect();
                println!("{}", line.join(" "));
            }
        }
        Commands::Recent {
            year,
            limit,
            offset,
        } => {
            let year = year.unwrap_or(this_year);
            let votes = service
                .house_recent(year, limit, offset)
                .await
                .with_context(|| format!("Failed to read the {year} House index"))?;
            if cli.json {
                print_json(&*votes)?;
            } else {
                display::print_vote_table(&votes);
            }
        }
        Commands::Roll { year, roll } => {
            let vote = service
                .house_roll(year, roll)
                .await
                .with_context(|| format!("Failed to load House roll {roll} of {year}"))?;
            if cli.json {
                print_json(&*vote)?;
            } else {
                display::print_vote_card(&vote);
            }
        }
        Commands::SenateRoll {
            congress,
            session,
            roll,
        } => {
            let vote = service
                .senate_roll(congress, session, roll)
                .await
                .with_context(|| {
                    format!("Failed to load Senate roll {roll} ({congress}th Congress, session {session})")
                })?;
            if cli.json {
                print_json(&*vote)?;
            } else {
                display::print_vote_card(&vote);
            }
        }
    }
    Ok(())
}

/// `RUST_LOG` when set and parseable, otherwise `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(service: Arc<AggregationService>, port: u16) -> Result<()> {
    let app = server::build_router(server::AppState::new(service));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_honours_rust_log() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(log_filter(Some("capitol_sync=trace")).to_string(), "capitol_sync=trace");
    }

    #[test]
    fn votes_take_chamber_and_window() {
        let cli = Cli::try_parse_from([
            "capitol", "votes", "--chamber", "senate", "--from", "2025-03-01", "--to", "2025-03-31",
        ])
        .unwrap();
        let Commands::Votes { chamber, from, to, .. } = cli.command else {
            panic!("expected votes");
        };
        assert_eq!(chamber, Chamber::Senate);
        assert_eq!(from.map(|d| d.to_string()).as_deref(), Some("2025-03-01"));
        assert_eq!(to.map(|d| d.to_string()).as_deref(), Some("2025-03-31"));

        assert!(Cli::try_parse_from(["capitol", "votes", "--chamber", "assembly"]).is_err());
        assert!(Cli::try_parse_from(["capitol", "votes", "--from", "March"]).is_err());
    }

    #[test]
    fn log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("  ")).to_string(), "info");
        assert_eq!(log_filter(Some("capitol=loud")).to_string(), "info");
    }
}
