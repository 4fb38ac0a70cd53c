//! Paper lookup against the bibliographic search API
//!
//! Provides:
//! - The canonical `Paper` record every other component consumes
//! - Normalization of raw upstream records (defaults for missing fields)
//! - `PaperIndex` trait with an HTTP client and a static in-process index

use crate::config::PaperIndexConfig;
use crate::errors::{AppError, Result, Upstream};
use crate::metrics::UpstreamTimer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Field set requested for every lookup
pub const PAPER_FIELDS: &str =
    "paperId,title,abstract,authors,year,citationCount,url,venue,publicationDate,fieldsOfStudy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

/// Canonical bibliographic record. Never persisted, always refetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub paper_id: String,
    pub title: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub citation_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields_of_study: Option<Vec<String>>,
}

impl Paper {
    /// Author names joined for prompts and exports
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Search envelope, same shape as the upstream's with normalized records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: u64,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
    pub data: Vec<Paper>,
}

// Upstream records: every field may be absent or null.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthor {
    name: Option<String>,
    author_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    authors: Option<Vec<RawAuthor>>,
    year: Option<i32>,
    citation_count: Option<i64>,
    url: Option<String>,
    venue: Option<String>,
    publication_date: Option<String>,
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    total: Option<u64>,
    offset: Option<u64>,
    next: Option<u64>,
    data: Option<Vec<RawPaper>>,
}

impl From<RawPaper> for Paper {
    fn from(raw: RawPaper) -> Self {
        Paper {
            paper_id: raw.paper_id.unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            abstract_text: raw.abstract_text,
            authors: raw
                .authors
                .unwrap_or_default()
                .into_iter()
                .map(|a| Author {
                    name: a.name.unwrap_or_default(),
                    author_id: a.author_id,
                })
                .collect(),
            year: raw.year,
            citation_count: raw.citation_count.unwrap_or(0).max(0) as u64,
            url: raw.url,
            venue: raw.venue,
            publication_date: raw.publication_date,
            fields_of_study: raw.fields_of_study,
        }
    }
}

/// Normalize one upstream paper object
pub fn normalize_paper(value: serde_json::Value) -> Result<Paper> {
    let raw: RawPaper = serde_json::from_value(value).map_err(|e| AppError::MalformedResponse {
        service: Upstream::PaperIndex,
        message: e.to_string(),
    })?;
    Ok(raw.into())
}

/// Normalize an upstream search envelope, keeping at most `limit` records
pub fn normalize_search(value: serde_json::Value, limit: usize) -> Result<SearchResponse> {
    let raw: RawSearchResponse =
        serde_json::from_value(value).map_err(|e| AppError::MalformedResponse {
            service: Upstream::PaperIndex,
            message: e.to_string(),
        })?;

    let mut data: Vec<Paper> = raw
        .data
        .unwrap_or_default()
        .into_iter()
        .map(Paper::from)
        .collect();
    data.truncate(limit);

    Ok(SearchResponse {
        total: raw.total.unwrap_or(data.len() as u64),
        offset: raw.offset.unwrap_or(0),
        next: raw.next,
        data,
    })
}

/// Reject empty or whitespace-only queries
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::MissingField {
            field: "query".to_string(),
        });
    }
    Ok(trimmed)
}

/// Lookup against the external paper index
#[async_trait]
pub trait PaperIndex: Send + Sync {
    /// Text search returning at most the configured number of records
    async fn search(&self, query: &str) -> Result<SearchResponse>;

    /// Single-record fetch by external id
    async fn get_paper(&self, paper_id: &str) -> Result<Paper>;

    /// Convenience: just the papers of a search
    async fn search_papers(&self, query: &str) -> Result<Vec<Paper>> {
        Ok(self.search(query).await?.data)
    }
}

/// HTTP client for the Semantic Scholar graph API
pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limit: usize,
}

impl SemanticScholarClient {
    pub fn new(config: &PaperIndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            limit: config.search_limit,
        })
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<serde_json::Value> {
        let timer = UpstreamTimer::start(Upstream::PaperIndex);

        let mut request = self.client.get(url);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let result = async {
            let response = request
                .send()
                .await
                .map_err(|e| AppError::upstream(Upstream::PaperIndex, e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::upstream(
                    Upstream::PaperIndex,
                    format!("API error {}: {}", status, body),
                ));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| AppError::MalformedResponse {
                    service: Upstream::PaperIndex,
                    message: e.to_string(),
                })
        }
        .await;

        timer.finish(result.is_ok());
        result
    }

    fn url(&self, path: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse(&format!("{}/{}", self.base_url, path)).map_err(|e| {
            AppError::Configuration {
                message: format!("Invalid paper index URL: {}", e),
            }
        })
    }
}

#[async_trait]
impl PaperIndex for SemanticScholarClient {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let query = validate_query(query)?;

        let mut url = self.url("paper/search")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("limit", &self.limit.to_string())
            .append_pair("fields", PAPER_FIELDS);

        let body = self.get_json(url).await?;
        let response = normalize_search(body, self.limit)?;

        tracing::debug!(query = %query, results = response.data.len(), "Paper search completed");
        Ok(response)
    }

    async fn get_paper(&self, paper_id: &str) -> Result<Paper> {
        let paper_id = paper_id.trim();
        if paper_id.is_empty() {
            return Err(AppError::MissingField {
                field: "paperId".to_string(),
            });
        }

        let mut url = self.url("paper")?;
        url.path_segments_mut()
            .map_err(|_| AppError::Configuration {
                message: "Paper index URL cannot be a base".to_string(),
            })?
            .push(paper_id);
        url.query_pairs_mut().append_pair("fields", PAPER_FIELDS);

        normalize_paper(self.get_json(url).await?)
    }
}

/// In-process index over a fixed set of papers, for development and tests
pub struct StaticPaperIndex {
    papers: Vec<Paper>,
    limit: usize,
}

impl StaticPaperIndex {
    pub fn new(papers: Vec<Paper>) -> Self {
        Self { papers, limit: 10 }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl PaperIndex for StaticPaperIndex {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let needle = validate_query(query)?.to_lowercase();

        let matches: Vec<Paper> = self
            .papers
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.abstract_text
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();

        let total = matches.len() as u64;
        let data: Vec<Paper> = matches.into_iter().take(self.limit).collect();

        Ok(SearchResponse {
            total,
            offset: 0,
            next: (total > data.len() as u64).then_some(data.len() as u64),
            data,
        })
    }

    async fn get_paper(&self, paper_id: &str) -> Result<Paper> {
        self.papers
            .iter()
            .find(|p| p.paper_id == paper_id)
            .cloned()
            .ok_or_else(|| {
                AppError::upstream(Upstream::PaperIndex, format!("API error 404: {}", paper_id))
            })
    }
}
