//! Paper lookup handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::AppState;
use paperlens_common::{
    errors::Result,
    papers::{Paper, PaperIndex, SearchResponse},
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

/// Text search against the paper index (top results only)
pub async fn search_papers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let query = params.query.unwrap_or_default();
    let response = state.papers.search(&query).await?;

    tracing::info!(
        query = %query.trim(),
        total = response.total,
        returned = response.data.len(),
        "Paper search"
    );

    Ok(Json(response))
}

/// Fetch one paper by its index id
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<Paper>> {
    let paper = state.papers.get_paper(&paper_id).await?;
    Ok(Json(paper))
}
