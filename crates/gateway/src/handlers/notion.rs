//! Workspace export handler
//!
//! A single action-dispatched endpoint. The workspace credential arrives in
//! the body on every call and is never stored.

use axum::extract::State;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::extract::Json;
use crate::AppState;
use paperlens_common::{
    analysis::Analysis,
    errors::{AppError, Result},
    papers::Paper,
    workspace::WorkspaceExporter,
};

/// Body of `POST /notion`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionRequest {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, rename = "access_token")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub paper: Option<Value>,
    #[serde(default)]
    pub analysis: Option<Value>,
}

enum Action {
    ListDatabases,
    CreateDatabase,
    AddToDatabase,
}

impl Action {
    fn parse(action: Option<&str>) -> Result<Self> {
        match action {
            Some("list_databases") => Ok(Action::ListDatabases),
            Some("create_database") => Ok(Action::CreateDatabase),
            Some("add_to_database") => Ok(Action::AddToDatabase),
            _ => Err(AppError::InvalidFormat {
                message: "Invalid action".to_string(),
            }),
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppError::MissingField {
        field: field.to_string(),
    })
}

/// Decoded after the credential check so a bad payload never masks a 401
fn required_json<T: DeserializeOwned>(value: Option<Value>, field: &str) -> Result<T> {
    let value = required(value.filter(|v| !v.is_null()), field)?;
    serde_json::from_value(value).map_err(|e| AppError::Validation {
        message: format!("Invalid {}: {}", field, e),
        field: Some(field.to_string()),
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String> {
    required(value.filter(|v| !v.trim().is_empty()), field)
}

pub async fn notion(
    State(state): State<AppState>,
    Json(request): Json<NotionRequest>,
) -> Result<Json<Value>> {
    let credential = request
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized {
            message: "No access token provided".to_string(),
        })?;

    match Action::parse(request.action.as_deref())? {
        Action::ListDatabases => {
            let databases = state.workspace.list_databases(&credential).await?;
            Ok(Json(json!({ "results": databases })))
        }
        Action::CreateDatabase => {
            let title = required_text(request.title, "title")?;
            let page_id = required_text(request.page_id, "pageId")?;

            let database = state
                .workspace
                .create_database(&credential, &title, &page_id)
                .await?;
            Ok(Json(serde_json::to_value(database)?))
        }
        Action::AddToDatabase => {
            let database_id = required_text(request.database_id, "databaseId")?;
            let paper: Paper = required_json(request.paper, "paper")?;
            let analysis: Analysis = required_json(request.analysis, "analysis")?;

            let record = state
                .workspace
                .add_record(&credential, &database_id, &paper, &analysis)
                .await?;

            tracing::info!(
                paper_id = %paper.paper_id,
                database_id = %database_id,
                "Paper exported to workspace"
            );

            Ok(Json(serde_json::to_value(record)?))
        }
    }
}
