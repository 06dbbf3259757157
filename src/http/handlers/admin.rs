//! Admin Handlers
//!
//! Health check and metrics endpoints.

use std::sync::Arc;

use axum::{Extension, Json};

use crate::http::dto::{HealthDto, StatsDto};
use crate::http::error::RestError;
use crate::http::AppState;

/// Health check endpoint
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_seconds(),
        submissions: state.log.len(),
    })
}

/// Current gauges in Prometheus text form
pub async fn metrics(Extension(state): Extension<Arc<AppState>>) -> String {
    state.metrics.render()
}

/// Directory-level counts over the loaded index and the submission log
pub async fn stats(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<StatsDto>, RestError> {
    let index = state.index.get()?;
    Ok(Json(StatsDto {
        sequences: index.sequences.len(),
        programs: index.programs.len(),
        submitters: index.submitters.iter().flatten().count(),
        submissions: state.log.len(),
        queued_fetches: state.next_ids.len(),
    }))
}
