//! Structured extraction through a hosted generative model.
//!
//! Defines the [`StructuredExtractor`] trait and the [`GeminiClient`]
//! implementation, which sends a fixed instruction plus the page excerpt to
//! a `generateContent` endpoint and parses the reply into a [`ProductInfo`].
//!
//! # Failure Modes
//!
//! | Condition | Error |
//! |-----------|-------|
//! | request did not complete | [`ExtractionError::Network`] |
//! | non-2xx status | [`ExtractionError::Api`] |
//! | no API key | [`ExtractionError::MissingApiKey`] |
//! | reply not the expected JSON shape | [`ExtractionError::MalformedResponse`] |
//!
//! Exactly one attempt is made per call. Every failure is recoverable by the
//! caller through the heuristic fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::ExtractionError;
use crate::models::ProductInfo;

/// Anything that can turn a page excerpt into structured product fields.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    async fn extract(&self, excerpt: &str) -> Result<ProductInfo, ExtractionError>;
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_k: 40,
            top_p: 0.8,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for a Gemini-style `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Build a client from config. An empty `api_key` is accepted here and
    /// reported as [`ExtractionError::MissingApiKey`] on use.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            generation: GenerationConfig {
                temperature: config.temperature,
                top_k: config.top_k,
                top_p: config.top_p,
            },
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExtractionError> {
        if self.api_key.trim().is_empty() {
            return Err(ExtractionError::MissingApiKey);
        }

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: self.generation,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| ExtractionError::Network(e.to_string()))?;
        first_candidate_text(&raw)
    }
}

#[async_trait]
impl StructuredExtractor for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn extract(&self, excerpt: &str) -> Result<ProductInfo, ExtractionError> {
        let prompt = build_prompt(excerpt);
        let reply = self.generate(&prompt).await?;
        parse_reply(&reply)
    }
}

/// The fixed instruction with the excerpt embedded.
pub fn build_prompt(excerpt: &str) -> String {
    format!(
        r#"Analyze this product webpage content and extract the following information.
Return ONLY a JSON object with no additional formatting or markdown, using this exact structure:
{{
  "title": "exact product title",
  "price": "numerical price value only (no currency symbols)",
  "specs": ["key specification 1", "key specification 2", "etc"],
  "currency": "currency symbol or code"
}}

Webpage content:
{excerpt}
"#
    )
}

/// `candidates[0].content.parts[0].text` from a raw response body.
fn first_candidate_text(raw: &str) -> Result<String, ExtractionError> {
    let parsed: GenerateResponse = serde_json::from_str(raw)
        .map_err(|e| ExtractionError::MalformedResponse(format!("response envelope: {}", e)))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ExtractionError::MalformedResponse("no candidate text".to_string()))
}

/// Strip markdown fences and surrounding commentary from a model reply.
pub fn clean_json_reply(text: &str) -> &str {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced).trim();

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced,
    }
}

/// Parse a model reply into [`ProductInfo`].
pub fn parse_reply(text: &str) -> Result<ProductInfo, ExtractionError> {
    serde_json::from_str(clean_json_reply(text))
        .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))
}
