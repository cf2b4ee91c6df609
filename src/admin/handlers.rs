use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::context::{AppContext, HealthReport};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
}

#[derive(Serialize)]
pub struct FlushResult {
    pub flushed: bool,
}

#[derive(Serialize)]
pub struct InvalidateResult {
    pub key: String,
    pub invalidated: bool,
}

#[derive(Serialize)]
pub struct LastRefresh {
    pub last_refresh: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
}

pub async fn get_status(State(ctx): State<Arc<AppContext>>) -> Json<SystemStatus> {
    let started_at = ctx.started_at();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if ctx.shutdown().is_triggered() { "shutting_down" } else { "operational" },
        started_at,
        uptime_secs: (Utc::now() - started_at).num_seconds(),
    })
}

pub async fn get_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(ctx.health())
}

pub async fn flush_cache(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<FlushResult>) {
    let flushed = ctx.cache().flush_all().await;
    let status = if flushed { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(FlushResult { flushed }))
}

pub async fn invalidate_key(
    State(ctx): State<Arc<AppContext>>,
    Path(key): Path<String>,
) -> Json<InvalidateResult> {
    let invalidated = ctx.cache().invalidate(&key).await;
    tracing::info!(key = %key, invalidated, "Cache key invalidated via admin API");
    Json(InvalidateResult { key, invalidated })
}

pub async fn get_last_refresh(State(ctx): State<Arc<AppContext>>) -> Json<LastRefresh> {
    let last_refresh = ctx.last_refresh();
    Json(LastRefresh {
        last_refresh,
        age_secs: last_refresh.map(|at| (Utc::now() - at).num_seconds()),
    })
}
