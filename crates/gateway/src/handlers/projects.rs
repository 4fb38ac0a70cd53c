//! Project handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::extract::Json;
use crate::AppState;
use paperlens_common::{
    auth::AuthContext,
    db::{
        models::{AnalysisRecord, Project},
        ProjectInput, ProjectStore,
    },
    errors::Result,
};

/// Body of project create and update
#[derive(Debug, Deserialize, Validate)]
pub struct ProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: Option<String>,
}

impl ProjectRequest {
    fn into_input(self) -> Result<ProjectInput> {
        let request = ProjectRequest {
            title: self.title.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };
        request.validate()?;

        Ok(ProjectInput {
            title: request.title,
            description: request.description,
        })
    }
}

/// A project with the analyses assigned to it
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub paper_analyses: Vec<AnalysisRecord>,
}

/// The caller's projects, newest first
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Project>>> {
    let projects = state.store.list_projects(auth.user_id).await?;
    Ok(Json(projects))
}

pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    let input = request.into_input()?;
    let project = state.store.create_project(auth.user_id, input).await?;

    tracing::info!(
        project_id = %project.id,
        user_id = %auth.user_id,
        "Project created"
    );

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectDetail>> {
    let project = state.store.get_project(project_id, auth.user_id).await?;
    let paper_analyses = state
        .store
        .list_project_analyses(project_id, auth.user_id)
        .await?;

    Ok(Json(ProjectDetail {
        project,
        paper_analyses,
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(request): Json<ProjectRequest>,
) -> Result<Json<Project>> {
    let input = request.into_input()?;
    let project = state
        .store
        .update_project(project_id, auth.user_id, input)
        .await?;

    tracing::info!(project_id = %project.id, user_id = %auth.user_id, "Project updated");

    Ok(Json(project))
}

/// Delete a project; its analyses become unassigned
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>> {
    state.store.delete_project(project_id, auth.user_id).await?;

    tracing::info!(project_id = %project_id, user_id = %auth.user_id, "Project deleted");

    Ok(Json(json!({ "success": true })))
}
