//! Primary/fallback merge of provider pipelines.
//!
//! ```text
//! Idle → PrimaryInFlight ─┬─ PrimarySucceeded ─ FallbackInFlight (hole-fill) ─┐
//!                         └─ PrimaryFailed ──── FallbackInFlight (full) … ────┴─ Merged → Cached
//! ```
//!
//! A primary record is never overwritten: fallbacks only fill keys the
//! primary did not produce. The orchestrator never fails; the worst outcome
//! is an empty set with the errors listed in the report.

use std::fmt;

use async_trait::async_trait;
use capitol_core::{Keyed, RecordSet};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SyncError;

/// One provider pipeline producing a keyed record set.
#[async_trait]
pub trait Source<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<RecordSet<T>, SyncError>;

    /// Whether an empty result is a real answer ("no votes in this range")
    /// rather than a broken provider. Empty is a failure unless this says so.
    fn empty_is_authoritative(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeState {
    Idle,
    PrimaryInFlight,
    PrimarySucceeded,
    PrimaryFailed,
    FallbackInFlight,
    Merged,
    Cached,
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What one merge cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub states: Vec<MergeState>,
    pub primary: String,
    /// Sources whose records ended up in the result, primary first.
    pub contributors: Vec<String>,
    pub holes_filled: usize,
    pub errors: Vec<String>,
}

impl MergeReport {
    pub fn state(&self) -> Option<MergeState> {
        self.states.last().copied()
    }

    fn enter(&mut self, label: &str, state: MergeState) {
        info!(merge = label, state = %state, "merge transition");
        self.states.push(state);
    }

    fn fail(&mut self, label: &str, source: &str, error: &SyncError) {
        warn!(merge = label, source, error = %error, "source failed");
        self.errors.push(format!("{source}: {error}"));
    }
}

#[derive(Debug, Serialize)]
pub struct Merged<T> {
    pub records: RecordSet<T>,
    pub report: MergeReport,
}

impl<T> Merged<T> {
    /// Close the cycle once the merged set has been stored.
    pub fn mark_cached(&mut self) {
        self.report.states.push(MergeState::Cached);
    }
}

pub struct Orchestrator<T> {
    label: String,
    primary: Box<dyn Source<T>>,
    fallbacks: Vec<Box<dyn Source<T>>>,
    hole_fill: bool,
}

impl<T: Keyed + Send> Orchestrator<T> {
    pub fn new(label: impl Into<String>, primary: Box<dyn Source<T>>) -> Self {
        Self {
            label: label.into(),
            primary,
            fallbacks: Vec::new(),
            hole_fill: true,
        }
    }

    pub fn fallback(mut self, source: Box<dyn Source<T>>) -> Self {
        self.fallbacks.push(source);
        self
    }

    /// Skip the hole-filling pass after a successful primary.
    pub fn without_hole_fill(mut self) -> Self {
        self.hole_fill = false;
        self
    }

    pub async fn run(&self) -> Merged<T> {
        let label = self.label.as_str();
        let mut report = MergeReport {
            primary: self.primary.name().to_string(),
            ..Default::default()
        };
        report.enter(label, MergeState::Idle);
        report.enter(label, MergeState::PrimaryInFlight);

        let primary_error = match self.primary.fetch().await {
            Ok(set) if !set.is_empty() || self.primary.empty_is_authoritative() => {
                report.enter(label, MergeState::PrimarySucceeded);
                report.contributors.push(report.primary.clone());
                let records = self.fill_holes(set, &mut report).await;
                report.enter(label, MergeState::Merged);
                return Merged { records, report };
            }
            Ok(_) => SyncError::NoRecords {
                provider: self.primary.name().to_string(),
            },
            Err(e) => e,
        };
        report.fail(label, self.primary.name(), &primary_error);
        report.enter(label, MergeState::PrimaryFailed);

        let records = self.full_fallback(&mut report).await;
        report.enter(label, MergeState::Merged);
        info!(merge = label, records = records.len(), errors = report.errors.len(), "merge complete");
        Merged { records, report }
    }

    async fn fill_holes(&self, mut set: RecordSet<T>, report: &mut MergeReport) -> RecordSet<T> {
        let label = self.label.as_str();
        let Some(fallback) = self.fallbacks.first().filter(|_| self.hole_fill && !set.is_empty())
        else {
            return set;
        };
        report.enter(label, MergeState::FallbackInFlight);
        match fallback.fetch().await {
            Ok(other) => {
                let added = set.fill_holes(other);
                if added > 0 {
                    report.contributors.push(fallback.name().to_string());
                }
                report.holes_filled = added;
                info!(merge = label, source = fallback.name(), added, "filled holes");
            }
            Err(e) => report.fail(label, fallback.name(), &e),
        }
        set
    }

    async fn full_fallback(&self, report: &mut MergeReport) -> RecordSet<T> {
        let label = self.label.as_str();
        let last = self.fallbacks.len().saturating_sub(1);
        for (i, fallback) in self.fallbacks.iter().enumerate() {
            report.enter(label, MergeState::FallbackInFlight);
            match fallback.fetch().await {
                Ok(set) if !set.is_empty() || i == last => {
                    report.contributors.push(fallback.name().to_string());
                    return set;
                }
                Ok(_) => report.fail(
                    label,
                    fallback.name(),
                    &SyncError::NoRecords {
                        provider: fallback.name().to_string(),
                    },
                ),
                Err(e) => report.fail(label, fallback.name(), &e),
            }
        }
        warn!(merge = label, "every source failed, returning an empty set");
        RecordSet::new()
    }
}
