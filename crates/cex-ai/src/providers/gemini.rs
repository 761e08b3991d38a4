use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;
use crate::error::ProviderError;
use crate::prompt::{extract_metrics, render_prompt};
use crate::traits::EvaluatorProvider;
use crate::types::{EvaluationPrompt, EvaluatorResponse};

#[derive(Clone)]
pub struct GeminiEvaluatorProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiEvaluatorProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Config("gemini api key is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }
}

#[async_trait::async_trait]
impl EvaluatorProvider for GeminiEvaluatorProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn evaluate(
        &self,
        prompt: EvaluationPrompt,
    ) -> Result<EvaluatorResponse, ProviderError> {
        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: render_prompt(&prompt),
                }],
            }],
        };

        let res = self
            .client
            .post(self.generate_content_url())
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: GenerateContentResponse = res.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no response from Gemini API".to_string())
            })?;

        let metrics = extract_metrics(&text)?;
        Ok(EvaluatorResponse {
            provider: self.name().to_string(),
            model: self.config.model.clone(),
            metrics,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
