//! Sequence Lookup and Search Handlers

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};

use crate::http::dto::{SearchPage, SearchParams, SequenceDto, SequenceSearchItem};
use crate::http::error::RestError;
use crate::http::AppState;
use crate::index::find_by_id;
use crate::search::{parse_search_query, search};
use crate::uid::Uid;

const DEFAULT_LIMIT: usize = 100;

/// `GET /sequences/<UID>`
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<SequenceDto>, RestError> {
    let id: Uid = raw_id
        .parse()
        .map_err(|_| RestError::bad_request(format!("Invalid id '{raw_id}'")))?;
    let index = state.index.get()?;
    let seq = find_by_id(&index.sequences, id)
        .ok_or_else(|| RestError::not_found(format!("Sequence {id} not found")))?;
    Ok(Json(SequenceDto::from_sequence(seq)))
}

/// `GET /sequences/<UID>/bfile` — the cached gzip term-table, fetched
/// from the upstream catalog on a cache miss.
pub async fn bfile(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, RestError> {
    let id: Uid = raw_id
        .parse()
        .map_err(|_| RestError::bad_request(format!("Invalid id '{raw_id}'")))?;
    let bytes = state.bfiles.get(id).await.map_err(|err| match err {
        crate::crawler::CrawlerError::Status(404) => {
            RestError::not_found(format!("B-file for {id} not found"))
        }
        other => RestError::internal(other.to_string()),
    })?;
    Ok((
        [
            (axum::http::header::CONTENT_TYPE, "application/gzip"),
            (
                axum::http::header::CONTENT_DISPOSITION,
                "attachment",
            ),
        ],
        bytes,
    ))
}

/// `GET /sequences/search?q&limit&skip`
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage<SequenceSearchItem>>, RestError> {
    let index = state.index.get()?;
    let query = parse_search_query(&params.q, &index.optypes);
    let (matches, total) = search(
        &index.sequences,
        &query,
        params.limit.unwrap_or(DEFAULT_LIMIT),
        params.skip.unwrap_or(0),
    );
    let results = matches
        .into_iter()
        .map(|seq| SequenceSearchItem {
            id: seq.id,
            name: seq.name.clone(),
        })
        .collect();
    Ok(Json(SearchPage { total, results }))
}
