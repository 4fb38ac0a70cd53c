//! Workspace export
//!
//! Pushes analyses into a page/database workspace (Notion API). Every call
//! takes the caller's workspace credential explicitly; nothing is cached.

use crate::analysis::Analysis;
use crate::config::WorkspaceConfig;
use crate::errors::{AppError, Result, Upstream};
use crate::metrics::{record_export_row, UpstreamTimer};
use crate::papers::Paper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Workspace rich text blocks are capped at this many characters
pub const RICH_TEXT_LIMIT: usize = 2000;

/// Text properties of the export schema, in column order
const TEXT_PROPERTIES: &[&str] = &[
    "Summary",
    "Authors",
    "Key Findings",
    "Methodology",
    "Limitations",
    "Future Work",
    "Impact",
];

/// A database in the caller's workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDatabase {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One exported row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub properties: Value,
}

/// Trait for workspace export targets
#[async_trait]
pub trait WorkspaceExporter: Send + Sync {
    /// Databases visible to the credential
    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>>;

    /// Create a database with the export schema under a parent page
    async fn create_database(
        &self,
        credential: &str,
        title: &str,
        parent_page_id: &str,
    ) -> Result<WorkspaceDatabase>;

    /// Append one paper and its analysis as a row
    async fn add_record(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord>;
}

fn require_credential(credential: &str) -> Result<&str> {
    let credential = credential.trim();
    if credential.is_empty() {
        return Err(AppError::Unauthorized {
            message: "No access token provided".to_string(),
        });
    }
    Ok(credential)
}

fn truncate(text: &str) -> String {
    text.chars().take(RICH_TEXT_LIMIT).collect()
}

fn rich_text(text: &str) -> Value {
    json!({ "rich_text": [{ "type": "text", "text": { "content": truncate(text) } }] })
}

/// Property schema of an export database
pub fn database_schema() -> Value {
    let mut properties = Map::new();
    properties.insert("Title".into(), json!({ "title": {} }));
    for name in TEXT_PROPERTIES {
        properties.insert((*name).into(), json!({ "rich_text": {} }));
    }
    properties.insert("Tags".into(), json!({ "multi_select": { "options": [] } }));
    properties.insert("URL".into(), json!({ "url": {} }));
    Value::Object(properties)
}

/// Row properties for one paper. Lists become newline-joined text, except
/// tags which become multi-select options.
pub fn record_properties(paper: &Paper, analysis: &Analysis) -> Value {
    json!({
        "Title": { "title": [{ "type": "text", "text": { "content": truncate(&paper.title) } }] },
        "Summary": rich_text(&analysis.summary),
        "Authors": rich_text(&paper.author_names()),
        "Tags": {
            "multi_select": analysis.tags.iter().map(|tag| json!({ "name": tag })).collect::<Vec<_>>()
        },
        "Key Findings": rich_text(&analysis.key_findings.join("\n")),
        "Methodology": rich_text(&analysis.methodology),
        "Limitations": rich_text(&analysis.limitations.join("\n")),
        "Future Work": rich_text(&analysis.future_work.join("\n")),
        "Impact": rich_text(&analysis.impact),
        "URL": { "url": paper.url },
    })
}

/// Plain text of a title array
fn plain_title(value: &Value) -> String {
    value
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").or_else(|| part.pointer("/text/content")))
                .filter_map(Value::as_str)
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn database_from_value(value: &Value) -> Result<WorkspaceDatabase> {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::MalformedResponse {
            service: Upstream::Workspace,
            message: "database object without id".to_string(),
        })?;

    Ok(WorkspaceDatabase {
        id: id.to_string(),
        title: value.get("title").map(plain_title).unwrap_or_default(),
        url: value.get("url").and_then(Value::as_str).map(String::from),
    })
}

/// Notion REST client
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl NotionClient {
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    async fn post(&self, credential: &str, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let timer = UpstreamTimer::start(Upstream::Workspace);

        let result = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(credential)
                .header("Notion-Version", &self.api_version)
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::upstream(Upstream::Workspace, e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::upstream(
                    Upstream::Workspace,
                    format!("API error {}: {}", status, body),
                ));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| AppError::MalformedResponse {
                    service: Upstream::Workspace,
                    message: e.to_string(),
                })
        }
        .await;

        timer.finish(result.is_ok());
        result
    }
}

#[async_trait]
impl WorkspaceExporter for NotionClient {
    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>> {
        let credential = require_credential(credential)?;

        let body = json!({ "filter": { "property": "object", "value": "database" } });
        let response = self.post(credential, "search", body).await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        results.iter().map(database_from_value).collect()
    }

    async fn create_database(
        &self,
        credential: &str,
        title: &str,
        parent_page_id: &str,
    ) -> Result<WorkspaceDatabase> {
        let credential = require_credential(credential)?;

        let body = json!({
            "parent": { "type": "page_id", "page_id": parent_page_id },
            "title": [{ "type": "text", "text": { "content": title, "link": null } }],
            "properties": database_schema(),
        });

        let response = self.post(credential, "databases", body).await?;
        let database = database_from_value(&response)?;

        tracing::info!(database_id = %database.id, "Workspace database created");
        Ok(database)
    }

    async fn add_record(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord> {
        let credential = require_credential(credential)?;

        let properties = record_properties(paper, analysis);
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
        });

        let response = self.post(credential, "pages", body).await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::MalformedResponse {
                service: Upstream::Workspace,
                message: "page object without id".to_string(),
            })?;

        record_export_row();
        Ok(WorkspaceRecord {
            id: id.to_string(),
            url: response.get("url").and_then(Value::as_str).map(String::from),
            properties: response.get("properties").cloned().unwrap_or(properties),
        })
    }
}

#[derive(Default)]
struct WorkspaceState {
    databases: Vec<WorkspaceDatabase>,
    rows: Vec<(String, WorkspaceRecord)>,
}

/// In-process workspace for development and tests
#[derive(Default)]
pub struct InMemoryWorkspace {
    state: RwLock<WorkspaceState>,
    next_id: AtomicUsize,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows added to a database, oldest first
    pub async fn rows(&self, database_id: &str) -> Vec<WorkspaceRecord> {
        let state = self.state.read().await;
        state
            .rows
            .iter()
            .filter(|(db, _)| db == database_id)
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn next_id(&self, kind: &str) -> String {
        format!("{}-{}", kind, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl WorkspaceExporter for InMemoryWorkspace {
    async fn list_databases(&self, credential: &str) -> Result<Vec<WorkspaceDatabase>> {
        require_credential(credential)?;
        Ok(self.state.read().await.databases.clone())
    }

    async fn create_database(
        &self,
        credential: &str,
        title: &str,
        _parent_page_id: &str,
    ) -> Result<WorkspaceDatabase> {
        require_credential(credential)?;

        let database = WorkspaceDatabase {
            id: self.next_id("db"),
            title: title.to_string(),
            url: None,
        };
        self.state.write().await.databases.push(database.clone());
        Ok(database)
    }

    async fn add_record(
        &self,
        credential: &str,
        database_id: &str,
        paper: &Paper,
        analysis: &Analysis,
    ) -> Result<WorkspaceRecord> {
        require_credential(credential)?;

        let mut state = self.state.write().await;
        if !state.databases.iter().any(|db| db.id == database_id) {
            return Err(AppError::upstream(
                Upstream::Workspace,
                format!("Could not find database with ID: {}", database_id),
            ));
        }

        let record = WorkspaceRecord {
            id: self.next_id("page"),
            url: None,
            properties: record_properties(paper, analysis),
        };
        state.rows.push((database_id.to_string(), record.clone()));

        record_export_row();
        Ok(record)
    }
}
