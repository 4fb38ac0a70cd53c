//! Typed gateway API
//!
//! `ResearchApi` is the seam the view state is written against; `ApiClient`
//! implements it over HTTP and attaches the session bearer to every
//! authenticated call.

use crate::session::Session;
use async_trait::async_trait;
use paperlens_common::{
    analysis::Analysis,
    db::models::{AnalysisRecord, Project},
    errors::{AppError, ErrorResponse, Result},
    papers::{Paper, SearchResponse},
    workspace::{WorkspaceDatabase, WorkspaceRecord},
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A project with the analyses assigned to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub paper_analyses: Vec<AnalysisRecord>,
}

#[async_trait]
pub trait ResearchApi: Send + Sync {
    async fn search_papers(&self, query: &str) -> Result<SearchResponse>;

    async fn get_paper(&self, paper_id: &str) -> Result<Paper>;

    /// The caller's record for a paper; `None` when not yet analyzed
    async fn get_analysis(&self, paper_id: &str) -> Result<Option<AnalysisRecord>>;

    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>>;

    /// Stored record, or a freshly generated and stored one
    async fn analyze_and_save(&self, paper: &Paper, project_id: Option<Uuid>) -> Result<AnalysisRecord>;

    async fn set_project(&self, analysis_id: Uuid, project_id: Option<Uuid>) -> Result<AnalysisRecord>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn get_project(&self, id: Uuid) -> Result<ProjectDetail>;

    async fn create_project(&self, title: &str, description: Option<&str>) -> Result<Project>;

    async fn update_project(&self, id: Uuid, title: &str, description: Option<&str>) -> Result<Project>;

    async fn delete_project(&self, id: Uuid) -> Result<()>;

    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>>;

    async fn create_database(&self, credential: &str, title: &str, page_id: &str) -> Result<WorkspaceDatabase>;

    async fn add_to_database(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord>;
}

/// HTTP client for the gateway
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

#[derive(Deserialize)]
struct DatabaseList {
    #[serde(default)]
    results: Vec<WorkspaceDatabase>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// `{base}{prefix}/{id}` with the id percent-encoded as one segment
    fn id_url(&self, prefix: &str, id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, prefix)).map_err(|e| {
            AppError::Configuration {
                message: format!("Invalid gateway URL: {}", e),
            }
        })?;
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration {
                message: "Gateway URL cannot be a base".to_string(),
            })?
            .push(id);
        Ok(url)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.session.bearer()?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &body, path));
        }

        Ok(response.json::<T>().await?)
    }

    async fn notion<T: DeserializeOwned>(&self, body: Value) -> Result<T> {
        self.send(self.request(Method::POST, "/notion").json(&body), "/notion")
            .await
    }
}

/// Map a gateway error body back onto the shared error type
fn error_from_response(status: StatusCode, body: &str, path: &str) -> AppError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string());

    match status {
        StatusCode::BAD_REQUEST => AppError::Validation { message, field: None },
        StatusCode::UNAUTHORIZED => AppError::Unauthorized { message },
        StatusCode::NOT_FOUND => AppError::not_found("resource", path),
        StatusCode::CONFLICT => AppError::Duplicate { message },
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited { limit: 0 },
        _ => AppError::Internal { message },
    }
}

#[async_trait]
impl ResearchApi for ApiClient {
    async fn search_papers(&self, query: &str) -> Result<SearchResponse> {
        let path = "/papers/search";
        let request = self.request(Method::GET, path).query(&[("query", query)]);
        self.send(request, path).await
    }

    async fn get_paper(&self, paper_id: &str) -> Result<Paper> {
        let url = self.id_url("/papers", paper_id)?;
        let path = url.path().to_string();
        self.send(self.client.get(url), &path).await
    }

    async fn get_analysis(&self, paper_id: &str) -> Result<Option<AnalysisRecord>> {
        let url = self.id_url("/analyses/paper", paper_id)?;
        let path = url.path().to_string();
        let request = self.client.get(url).bearer_auth(self.session.bearer()?);

        match self.send(request, &path).await {
            Ok(record) => Ok(Some(record)),
            Err(AppError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_analyses(&self) -> Result<Vec<AnalysisRecord>> {
        self.send(self.authed(Method::GET, "/analyses")?, "/analyses").await
    }

    async fn analyze_and_save(&self, paper: &Paper, project_id: Option<Uuid>) -> Result<AnalysisRecord> {
        let body = json!({ "paper": paper, "project_id": project_id });
        self.send(self.authed(Method::POST, "/analyses")?.json(&body), "/analyses")
            .await
    }

    async fn set_project(&self, analysis_id: Uuid, project_id: Option<Uuid>) -> Result<AnalysisRecord> {
        let path = format!("/analyses/{}/project", analysis_id);
        let body = json!({ "project_id": project_id });
        self.send(self.authed(Method::PUT, &path)?.json(&body), &path).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.send(self.authed(Method::GET, "/projects")?, "/projects").await
    }

    async fn get_project(&self, id: Uuid) -> Result<ProjectDetail> {
        let path = format!("/projects/{}", id);
        self.send(self.authed(Method::GET, &path)?, &path).await
    }

    async fn create_project(&self, title: &str, description: Option<&str>) -> Result<Project> {
        let body = json!({ "title": title, "description": description });
        self.send(self.authed(Method::POST, "/projects")?.json(&body), "/projects")
            .await
    }

    async fn update_project(&self, id: Uuid, title: &str, description: Option<&str>) -> Result<Project> {
        let path = format!("/projects/{}", id);
        let body = json!({ "title": title, "description": description });
        self.send(self.authed(Method::PUT, &path)?.json(&body), &path).await
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        let path = format!("/projects/{}", id);
        let _: Value = self.send(self.authed(Method::DELETE, &path)?, &path).await?;
        Ok(())
    }

    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>> {
        let list: DatabaseList = self
            .notion(json!({ "action": "list_databases", "access_token": credential }))
            .await?;
        Ok(list.results)
    }

    async fn create_database(&self, credential: &str, title: &str, page_id: &str) -> Result<WorkspaceDatabase> {
        self.notion(json!({
            "action": "create_database",
            "access_token": credential,
            "title": title,
            "pageId": page_id,
        }))
        .await
    }

    async fn add_to_database(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord> {
        self.notion(json!({
            "action": "add_to_database",
            "access_token": credential,
            "databaseId": database_id,
            "paper": paper,
            "analysis": analysis,
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_bodies_map_to_variants() {
        let body = r#"{"error":"Missing required field: query","code":"MISSING_FIELD"}"#;
        match error_from_response(StatusCode::BAD_REQUEST, body, "/papers/search") {
            AppError::Validation { message, .. } => assert_eq!(message, "Missing required field: query"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            error_from_response(StatusCode::NOT_FOUND, "", "/projects/x"),
            AppError::NotFound { .. }
        ));
        assert!(matches!(
            error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "not json", "/analyze"),
            AppError::Internal { .. }
        ));
    }

    #[test]
    fn test_paper_ids_are_one_encoded_segment() {
        let client = ApiClient::new("http://gateway.local/", Arc::new(Session::new())).unwrap();

        let url = client.id_url("/analyses/paper", "DOI:10.18653/v1/N19-1423").unwrap();
        assert_eq!(url.path(), "/analyses/paper/DOI:10.18653%2Fv1%2FN19-1423");

        let url = client.id_url("/papers", "a?b#c").unwrap();
        assert_eq!(url.path(), "/papers/a%3Fb%23c");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[tokio::test]
    async fn test_authenticated_calls_need_a_session() {
        let client = ApiClient::new("http://127.0.0.1:9", Arc::new(Session::new())).unwrap();
        assert!(matches!(
            client.list_projects().await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_project_detail_deserializes_flat() {
        let body = json!({
            "id": Uuid::new_v4(),
            "title": "T",
            "description": null,
            "user_id": Uuid::new_v4(),
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
            "paper_analyses": []
        });
        let detail: ProjectDetail = serde_json::from_value(body).unwrap();
        assert_eq!(detail.project.title, "T");
        assert!(detail.paper_analyses.is_empty());
    }
}
