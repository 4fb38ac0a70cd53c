//! Saved analysis handlers
//!
//! Every route is scoped to the caller; another user's records read as
//! missing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::extract::Json;
use crate::AppState;
use paperlens_common::{
    analysis::analyze_and_save,
    auth::AuthContext,
    db::{models::AnalysisRecord, AnalysisStore},
    errors::{AppError, Result},
    papers::Paper,
};

/// Body of `POST /analyses`
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub paper: Paper,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

/// Body of `PUT /analyses/{id}/project`; null unassigns
#[derive(Debug, Deserialize)]
pub struct SetProjectRequest {
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

/// The caller's analyses, newest first
pub async fn list_analyses(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<AnalysisRecord>>> {
    let records = state.store.list_analyses(auth.user_id).await?;
    Ok(Json(records))
}

/// The caller's analysis of one paper
pub async fn get_analysis(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(paper_id): Path<String>,
) -> Result<Json<AnalysisRecord>> {
    state
        .store
        .get_analysis(&paper_id, auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("analysis", paper_id))
}

/// Serve the stored analysis or generate and store one
pub async fn create_analysis(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<AnalyzeRequest>,
) -> Result<(StatusCode, Json<AnalysisRecord>)> {
    let outcome = analyze_and_save(
        state.store.as_ref(),
        state.analyzer.as_ref(),
        auth.user_id,
        &request.paper,
        request.project_id,
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        analysis_id = %outcome.record.id,
        created = outcome.created,
        "Analysis served"
    );

    let status = if outcome.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(outcome.record)))
}

/// Move an analysis into a project, or back to unassigned
pub async fn set_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(analysis_id): Path<Uuid>,
    Json(request): Json<SetProjectRequest>,
) -> Result<Json<AnalysisRecord>> {
    let record = state
        .store
        .set_project(analysis_id, auth.user_id, request.project_id)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        analysis_id = %analysis_id,
        project_id = ?request.project_id,
        "Analysis project updated"
    );

    Ok(Json(record))
}
