//! Program Lookup, Search, and Evaluation Handlers

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};

use crate::http::dto::{
    EvalRequest, ExportRequest, ProgramDto, ProgramSearchItem, SearchPage, SearchParams,
};
use crate::http::error::RestError;
use crate::http::AppState;
use crate::index::find_by_id;
use crate::keywords;
use crate::search::{parse_search_query, search};
use crate::tool::ToolResult;
use crate::uid::Uid;

const DEFAULT_LIMIT: usize = 100;

/// `GET /programs/<UID>`
pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<ProgramDto>, RestError> {
    let id: Uid = raw_id
        .parse()
        .map_err(|_| RestError::bad_request(format!("Invalid id '{raw_id}'")))?;
    let index = state.index.get()?;
    let prog = find_by_id(&index.programs, id)
        .ok_or_else(|| RestError::not_found(format!("Program {id} not found")))?;
    Ok(Json(ProgramDto::from_program(prog)))
}

/// `GET /programs/search?q&limit&skip`
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage<ProgramSearchItem>>, RestError> {
    let index = state.index.get()?;
    let query = parse_search_query(&params.q, &index.optypes);
    let (matches, total) = search(
        &index.programs,
        &query,
        params.limit.unwrap_or(DEFAULT_LIMIT),
        params.skip.unwrap_or(0),
    );
    let results = matches
        .into_iter()
        .map(|prog| ProgramSearchItem {
            id: prog.id,
            name: prog.name.clone(),
            keywords: keywords::decode(prog.keywords),
        })
        .collect();
    Ok(Json(SearchPage { total, results }))
}

/// `POST /programs/eval`
pub async fn eval(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<EvalRequest>,
) -> Result<Json<ToolResult>, RestError> {
    if request.content.trim().is_empty() {
        return Err(RestError::bad_request("Missing program content"));
    }
    let num_terms = request.num_terms.unwrap_or(state.config.tool.num_terms);
    let result = state.evaluator.eval(&request.content, num_terms).await?;
    Ok(Json(result))
}

/// `POST /programs/export`
pub async fn export(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ToolResult>, RestError> {
    if request.content.trim().is_empty() {
        return Err(RestError::bad_request("Missing program content"));
    }
    let result = state
        .evaluator
        .export(&request.content, &request.format)
        .await?;
    Ok(Json(result))
}
