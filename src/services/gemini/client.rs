use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::api::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part, Tool, ToolConfig};
use super::prompts;
use crate::services::grounding::split_grounding;
use crate::services::suggestions::parse_suggestions;
use crate::services::types::{Coordinates, LandmarkDetails, SuggestionResult};
use crate::services::{EnrichmentService, IdentificationService, NarrationService, SuggestionService};
use crate::vision::capture::CapturedImage;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const NO_INFORMATION: &str = "No information found.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiModels {
    pub vision: String,
    pub details: String,
    pub speech: String,
    pub voice: String,
}

impl Default for GeminiModels {
    fn default() -> Self {
        Self {
            vision: "gemini-3-pro-preview".to_string(),
            details: "gemini-2.5-flash".to_string(),
            speech: "gemini-2.5-flash-preview-tts".to_string(),
            voice: "Kore".to_string(),
        }
    }
}

/// Hosted Gemini models behind every guide collaborator.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    models: GeminiModels,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, models: GeminiModels, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self::with_http_client(client, api_key, base_url, models))
    }

    /// Use a preconfigured HTTP client, e.g. one with its own proxy settings.
    pub fn with_http_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        models: GeminiModels,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            models,
        }
    }

    pub fn models(&self) -> &GeminiModels {
        &self.models
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        debug!(model, "Calling generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("request to {} failed", model))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini {} returned {}: {}", model, status, body.trim()));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .with_context(|| format!("unreadable response from {}", model))
    }
}

#[async_trait]
impl IdentificationService for GeminiClient {
    async fn identify(&self, image: &CapturedImage, location: Option<Coordinates>) -> Result<Option<String>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::inline(&image.mime_type, &image.data),
                Part::text(prompts::identify(location)),
            ])],
            ..GenerateContentRequest::default()
        };

        let response = self
            .generate(&self.models.vision, &request)
            .await
            .context("Failed to identify image.")?;

        let name = response
            .text()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        info!(identified = ?name, "Identification finished");
        Ok(name)
    }
}

#[async_trait]
impl EnrichmentService for GeminiClient {
    async fn enrich(&self, name: &str, location: Option<Coordinates>) -> Result<LandmarkDetails> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompts::details(name))])],
            tools: Some(vec![Tool::google_search(), Tool::google_maps()]),
            tool_config: location.map(|at| ToolConfig::near(at.lat, at.lng)),
            ..GenerateContentRequest::default()
        };

        let response = self
            .generate(&self.models.details, &request)
            .await
            .context("Failed to fetch details.")?;

        let description = response.text().unwrap_or_else(|| NO_INFORMATION.to_string());
        let split = split_grounding(name, response.grounding_chunks());
        info!(
            sources = split.sources.len(),
            nearby = split.nearby_places.len(),
            mapped = split.map_info.is_some(),
            "Enrichment finished"
        );

        Ok(LandmarkDetails {
            description,
            sources: split.sources,
            map_info: split.map_info,
            nearby_places: split.nearby_places,
        })
    }
}

#[async_trait]
impl NarrationService for GeminiClient {
    async fn narrate(&self, text: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(text)])],
            generation_config: Some(GenerationConfig::speech(&self.models.voice)),
            ..GenerateContentRequest::default()
        };

        let response = self
            .generate(&self.models.speech, &request)
            .await
            .context("Failed to generate speech.")?;

        match response.inline_data() {
            Some(data) => Ok(data.to_string()),
            None => {
                warn!("Speech response carried no inline audio");
                Err(anyhow!("No audio data returned."))
            }
        }
    }
}

#[async_trait]
impl SuggestionService for GeminiClient {
    async fn suggest(&self, location: Coordinates) -> Result<SuggestionResult> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompts::suggestions(location))])],
            tools: Some(vec![Tool::google_maps()]),
            tool_config: Some(ToolConfig::near(location.lat, location.lng)),
            ..GenerateContentRequest::default()
        };

        let response = self
            .generate(&self.models.details, &request)
            .await
            .context("Failed to get suggestions.")?;

        let places = response
            .grounding_chunks()
            .into_iter()
            .filter(|c| c.maps.is_some())
            .collect();
        let text = response.text().unwrap_or_else(|| "{}".to_string());
        Ok(parse_suggestions(&text, places))
    }
}
