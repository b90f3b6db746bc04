//! JSON proxy over the aggregation service.
//!
//! Numeric query parameters are read leniently: a missing, empty or
//! non-numeric value is treated as absent, so `?year=abc` falls back to the
//! current year just like no `year` at all. Dates and chambers are not
//! guessed at; a malformed one is a 400.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use capitol_core::urls::{clerk_index_url, clerk_roll_url, senate_roll_url};
use capitol_core::vote::sort_newest_first;
use capitol_core::{Chamber, VoteWindow};
use capitol_sync::service::{KpiMerge, clamp_recent_limit};
use capitol_sync::{AggregationService, SharedError};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AggregationService>,
}

impl AppState {
    pub fn new(service: Arc<AggregationService>) -> Self {
        Self { service }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/house/index", get(house_index))
        .route("/api/house/roll", get(house_roll))
        .route("/api/house/recent", get(house_recent))
        .route("/api/senate/roll", get(senate_roll))
        .route("/api/kpis", get(kpis))
        .route("/api/kpis/rebuild", post(rebuild_kpis))
        .route("/api/votes", get(votes))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Upstream(SharedError),
}

impl From<SharedError> for ApiError {
    fn from(e: SharedError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            ApiError::Upstream(e) => {
                warn!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Raw query parameters; every endpoint picks the ones it needs.
#[derive(Debug, Default, Deserialize)]
pub struct Params {
    year: Option<String>,
    roll: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
    congress: Option<String>,
    session: Option<String>,
    cap: Option<String>,
    chamber: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

fn parse<T: FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

/// A strictly positive number, or `None`.
fn positive<T: FromStr + Default + PartialOrd>(raw: &Option<String>) -> Option<T> {
    parse(raw).filter(|v: &T| *v > T::default())
}

fn year_or_current(params: &Params) -> i32 {
    positive(&params.year).unwrap_or_else(|| Utc::now().year())
}

/// Blank reads as absent; anything else must be a calendar date.
fn date(raw: &Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("from and to must be YYYY-MM-DD")),
    }
}

/// `from`/`to` when given, otherwise the whole of `year`.
fn vote_window(params: &Params) -> Result<VoteWindow, ApiError> {
    let (from, to) = (date(&params.from)?, date(&params.to)?);
    VoteWindow::resolve(from, to, year_or_current(params))
        .ok_or(ApiError::BadRequest("from must not be after to"))
}

fn chamber_param(params: &Params) -> Result<Chamber, ApiError> {
    match params.chamber.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Chamber::House),
        Some(c) => c
            .parse()
            .map_err(|_| ApiError::BadRequest("chamber must be house or senate")),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "capitol".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/house/index?year=2025
async fn house_index(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    let year = year_or_current(&params);
    let rolls = state.service.house_index(year).await?;
    Ok(Json(json!({ "year": year, "count": rolls.len(), "rolls": *rolls })))
}

/// GET /api/house/roll?year=2025&roll=145
async fn house_roll(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    let (Some(year), Some(roll)) = (positive::<i32>(&params.year), positive::<u32>(&params.roll))
    else {
        return Err(ApiError::BadRequest("year and roll are required"));
    };
    let vote = state.service.house_roll(year, roll).await?;
    let primary = clerk_roll_url(&state.service.config().endpoints.clerk, year, roll);
    Ok(Json(json!({ "year": year, "data": *vote, "primary": primary })))
}

/// GET /api/house/recent?year=2025&limit=50&offset=0
async fn house_recent(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    let year = year_or_current(&params);
    let limit = clamp_recent_limit(parse(&params.limit));
    let offset: usize = parse(&params.offset).unwrap_or(0);
    let votes = state.service.house_recent(year, Some(limit), offset).await?;
    let primary = clerk_index_url(&state.service.config().endpoints.clerk, year);
    Ok(Json(json!({
        "year": year,
        "limit": limit,
        "offset": offset,
        "returned": votes.len(),
        "primary": primary,
        "objects": *votes,
    })))
}

/// GET /api/senate/roll?congress=119&session=1&roll=12
async fn senate_roll(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Value>, ApiError> {
    let (Some(congress), Some(session), Some(roll)) = (
        positive::<u32>(&params.congress),
        positive::<u32>(&params.session),
        positive::<u32>(&params.roll),
    ) else {
        return Err(ApiError::BadRequest("congress, session and roll are required"));
    };
    let vote = state.service.senate_roll(congress, session, roll).await?;
    let primary = senate_roll_url(&state.service.config().endpoints.senate, congress, session, roll);
    Ok(Json(json!({
        "congress": congress,
        "session": session,
        "data": *vote,
        "primary": primary,
    })))
}

fn kpi_body(merged: &KpiMerge) -> Json<Value> {
    Json(json!({
        "count": merged.records.len(),
        "kpis": merged.records,
        "report": merged.report,
    }))
}

/// GET /api/kpis
async fn kpis(State(state): State<AppState>) -> Json<Value> {
    kpi_body(&*state.service.kpis().await)
}

/// POST /api/kpis/rebuild
async fn rebuild_kpis(State(state): State<AppState>) -> Json<Value> {
    kpi_body(&*state.service.rebuild_kpis().await)
}

/// GET /api/votes?chamber=house&from=2025-01-01&to=2025-03-31&cap=200
///
/// Without `from`/`to` the window is the whole of `year` (default: this year).
async fn votes(State(state): State<AppState>, Query(params): Query<Params>) -> Result<Json<Value>, ApiError> {
    let chamber = chamber_param(&params)?;
    let window = vote_window(&params)?;
    let merged = state.service.votes(chamber, window, positive(&params.cap)).await;
    let mut votes = merged.records.clone().into_values();
    sort_newest_first(&mut votes);
    Ok(Json(json!({
        "chamber": chamber.slug(),
        "from": window.start(),
        "to": window.end(),
        "count": votes.len(),
        "votes": votes,
        "report": merged.report,
    })))
}
