//! Submission Intake Handlers
//!
//! `GET /submissions` pages through the log in acceptance order;
//! `POST /submissions` runs validation, admission control, and the
//! type-specific side effects. Accept/reject decisions always travel as
//! HTTP 200 with a structured `{status, message}` body.

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};

use crate::http::dto::{SubmissionsQuery, SubmitOutcome};
use crate::http::error::RestError;
use crate::http::AppState;
use crate::submissions::{Kind, Mode, Submission, SubmissionFilter, SubmissionPage};

/// Default page size when the caller does not pass `limit`.
const DEFAULT_LIMIT: usize = 100;

/// `GET /submissions?mode&type&submitter&limit&skip`
pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SubmissionsQuery>,
) -> Result<Json<SubmissionPage>, RestError> {
    let mode = match params.mode.as_deref() {
        Some(raw) => Some(
            Mode::parse(raw).ok_or_else(|| RestError::bad_request(format!("Unknown mode '{raw}'")))?,
        ),
        None => None,
    };
    let kind = match params.kind.as_deref() {
        Some(raw) => Some(
            Kind::parse(raw).ok_or_else(|| RestError::bad_request(format!("Unknown type '{raw}'")))?,
        ),
        None => None,
    };
    let filter = SubmissionFilter {
        mode,
        kind,
        submitter: params.submitter,
        limit: params.limit.unwrap_or(DEFAULT_LIMIT),
        skip: params.skip.unwrap_or(0),
    };
    Ok(Json(state.log.query(&filter)))
}

/// `POST /submissions`
pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Json(mut sub): Json<Submission>,
) -> Json<SubmitOutcome> {
    if let Err(err) = sub.prepare() {
        return Json(SubmitOutcome::error(err.to_string()));
    }
    if let Err(err) = state.log.check_submit(&sub) {
        return Json(SubmitOutcome::error(err.to_string()));
    }
    match (sub.kind, sub.mode) {
        (Kind::Bfile, Mode::Remove) => {
            if let Err(err) = state.log.remove_bfile(sub.id) {
                return Json(SubmitOutcome::error(err.to_string()));
            }
        }
        (Kind::Sequence, Mode::Refresh) => {
            if let Err(err) = state.log.refresh_sequence(sub.id) {
                return Json(SubmitOutcome::error(err.to_string()));
            }
            // A refreshed entry is re-fetched ahead of the walk.
            state
                .next_ids
                .add(sub.id.number(), state.config.crawler.max_queue_size);
        }
        _ => {}
    }
    state.log.do_submit(sub);
    Json(SubmitOutcome::success())
}
