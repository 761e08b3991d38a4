use std::time::Duration;

use crate::error::ProviderError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            timeout: Duration::from_secs(15),
            temperature: 0.0,
            max_tokens: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EvaluatorProviderConfig {
    OpenAi(OpenAiConfig),
    Gemini(GeminiConfig),
}

impl EvaluatorProviderConfig {
    /// Builds a config from a provider name (`openai` or `gemini`), a key and
    /// an optional model; the provider's default model is used otherwise.
    pub fn from_parts(
        provider: &str,
        api_key: impl Into<String>,
        model: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("api key is empty".to_string()));
        }
        let model = model.filter(|m| !m.trim().is_empty());
        match provider.trim().to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(Self::OpenAi(OpenAiConfig::new(
                api_key,
                model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            ))),
            "gemini" => Ok(Self::Gemini(GeminiConfig::new(
                api_key,
                model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            ))),
            other => Err(ProviderError::Config(format!(
                "unsupported provider '{other}', use openai or gemini"
            ))),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        match &mut self {
            Self::OpenAi(c) => c.base_url = base_url.into(),
            Self::Gemini(c) => c.base_url = base_url.into(),
        }
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match &mut self {
            Self::OpenAi(c) => c.timeout = timeout,
            Self::Gemini(c) => c.timeout = timeout,
        }
        self
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => "openai",
            Self::Gemini(_) => "gemini",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(c) => &c.model,
            Self::Gemini(c) => &c.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_applies_default_models() {
        let cfg = EvaluatorProviderConfig::from_parts("OpenAI", "sk-test", None).expect("openai");
        assert_eq!(cfg.provider_name(), "openai");
        assert_eq!(cfg.model(), DEFAULT_OPENAI_MODEL);

        let cfg = EvaluatorProviderConfig::from_parts("gemini", "g-key", Some(String::new()))
            .expect("gemini");
        assert_eq!(cfg.model(), DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn from_parts_keeps_explicit_model_and_base_url() {
        let cfg = EvaluatorProviderConfig::from_parts("gemini", "g-key", Some("gemini-pro".into()))
            .expect("gemini")
            .with_base_url("http://127.0.0.1:9");
        match cfg {
            EvaluatorProviderConfig::Gemini(c) => {
                assert_eq!(c.model, "gemini-pro");
                assert_eq!(c.base_url, "http://127.0.0.1:9");
            }
            EvaluatorProviderConfig::OpenAi(_) => panic!("expected gemini config"),
        }
    }

    #[test]
    fn from_parts_rejects_unknown_provider_and_blank_key() {
        assert!(matches!(
            EvaluatorProviderConfig::from_parts("claude", "k", None),
            Err(ProviderError::Config(_))
        ));
        assert!(matches!(
            EvaluatorProviderConfig::from_parts("openai", "  ", None),
            Err(ProviderError::Config(_))
        ));
    }
}
