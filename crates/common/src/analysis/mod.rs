//! Paper analysis generation
//!
//! Provides:
//! - The `Analysis` value object (lenient on the way in, strict on the way out)
//! - The fixed instruction template sent to the completion API
//! - `AnalysisGenerator` trait with an OpenAI-compatible client and a mock
//! - The analyze-and-save flow tying generation to persistence

mod flow;
mod model;

pub use flow::{analyze_and_save, AnalyzeOutcome};
pub use model::Analysis;

use crate::config::CompletionConfig;
use crate::errors::{AppError, Result, Upstream};
use crate::metrics::UpstreamTimer;
use crate::papers::Paper;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parse completion output into an Analysis.
///
/// Fails only when the content is empty, not JSON, or not a JSON object.
pub fn parse_analysis(content: &str) -> Result<Analysis> {
    let malformed = |message: String| AppError::MalformedResponse {
        service: Upstream::Completion,
        message,
    };

    if content.trim().is_empty() {
        return Err(malformed("No response content".to_string()));
    }

    let value: Value = serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("Expected a JSON object".to_string()));
    }

    let analysis: Analysis = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    Ok(analysis.normalize_tags())
}

pub const SYSTEM_PROMPT: &str = "You are a research paper analysis assistant. \
Analyze the given paper and provide structured insights. Be concise but thorough and \
focus on the most important aspects. For tags, give 3-4 specific research areas or \
topics that best categorize the paper.";

/// Build the fixed instruction for one paper
pub fn build_prompt(paper: &Paper) -> String {
    let year = paper
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let abstract_text = paper.abstract_text.as_deref().unwrap_or("Not available");

    format!(
        r#"Analyze the following research paper:
Title: {title}
Authors: {authors}
Year: {year}
Abstract: {abstract_text}

Provide a comprehensive analysis including:
1. 3-4 concise tags naming the main research areas and topics (e.g. "Machine Learning", "Computer Vision")
2. A concise summary (2-3 sentences)
3. Key findings and contributions
4. Methodology overview
5. Limitations and potential weaknesses
6. Future research directions
7. Impact on the field

Respond with JSON in exactly this structure:
{{
  "tags": ["string"],
  "summary": "string",
  "keyFindings": ["string"],
  "methodology": "string",
  "limitations": ["string"],
  "futureWork": ["string"],
  "impact": "string"
}}"#,
        title = paper.title,
        authors = paper.author_names(),
    )
}

/// Trait for analysis generation
#[async_trait]
pub trait AnalysisGenerator: Send + Sync {
    /// Generate a fresh analysis; never cached
    async fn analyze(&self, paper: &Paper) -> Result<Analysis>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAIAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAIAnalyzer {
    /// Create a new analyzer
    pub fn new(api_key: String, model: String, base_url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: prompt },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::upstream(Upstream::Completion, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(
                Upstream::Completion,
                format!("API error {}: {}", status, body),
            ));
        }

        let result: ChatResponse = response.json().await.map_err(|e| AppError::MalformedResponse {
            service: Upstream::Completion,
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl AnalysisGenerator for OpenAIAnalyzer {
    async fn analyze(&self, paper: &Paper) -> Result<Analysis> {
        let prompt = build_prompt(paper);

        let timer = UpstreamTimer::start(Upstream::Completion);
        let result = match self.complete(&prompt).await {
            Ok(content) => parse_analysis(&content),
            Err(e) => Err(e),
        };
        timer.finish(result.is_ok());

        if let Err(ref e) = result {
            tracing::warn!(paper_id = %paper.paper_id, error = %e, "Paper analysis failed");
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic analyzer for development and tests
#[derive(Default)]
pub struct MockAnalyzer {
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of analyses generated so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisGenerator for MockAnalyzer {
    async fn analyze(&self, paper: &Paper) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut tags: Vec<String> = paper
            .fields_of_study
            .clone()
            .unwrap_or_default()
            .into_iter()
            .take(4)
            .collect();
        if tags.is_empty() {
            tags = vec!["Research".to_string(), "Literature".to_string(), "Survey".to_string()];
        }

        Ok(Analysis {
            tags,
            summary: format!("{} is summarized here.", paper.title),
            key_findings: vec![format!("{} reports its main result.", paper.title)],
            methodology: "Described in the paper.".to_string(),
            limitations: vec!["Not assessed by the mock analyzer.".to_string()],
            future_work: vec!["Follow-up studies.".to_string()],
            impact: format!("Cited {} times.", paper.citation_count),
        }
        .normalize_tags())
    }

    fn model_name(&self) -> &str {
        "mock-analyzer"
    }
}

/// Create an analyzer based on configuration
pub fn create_analyzer(config: &CompletionConfig) -> Result<Arc<dyn AnalysisGenerator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "completion.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIAnalyzer::new(
                key,
                config.model.clone(),
                config.api_base.clone(),
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "mock" => Ok(Arc::new(MockAnalyzer::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown completion provider: {}", other),
        }),
    }
}
