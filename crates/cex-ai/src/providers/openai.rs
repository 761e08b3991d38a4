use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OpenAiConfig;
use crate::error::ProviderError;
use crate::prompt::{SYSTEM_MESSAGE, extract_metrics, render_prompt};
use crate::traits::EvaluatorProvider;
use crate::types::{EvaluationPrompt, EvaluatorResponse};

/// Chat-completions evaluator.
#[derive(Clone)]
pub struct OpenAiEvaluatorProvider {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiEvaluatorProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Config("openai api key is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl EvaluatorProvider for OpenAiEvaluatorProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn evaluate(
        &self,
        prompt: EvaluationPrompt,
    ) -> Result<EvaluatorResponse, ProviderError> {
        let user_text = render_prompt(&prompt);
        let payload = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: &user_text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let parsed: ChatResponse = res.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no response from OpenAI API".to_string())
            })?;

        let metrics = extract_metrics(&text)?;
        Ok(EvaluatorResponse {
            provider: self.name().to_string(),
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            metrics,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
