use std::sync::Arc;

use crate::config::EvaluatorProviderConfig;
use crate::error::ProviderError;
use crate::providers::{GeminiEvaluatorProvider, OpenAiEvaluatorProvider};
use crate::traits::EvaluatorProvider;

pub fn build_evaluator_provider(
    cfg: EvaluatorProviderConfig,
) -> Result<Arc<dyn EvaluatorProvider>, ProviderError> {
    match cfg {
        EvaluatorProviderConfig::OpenAi(c) => Ok(Arc::new(OpenAiEvaluatorProvider::new(c)?)),
        EvaluatorProviderConfig::Gemini(c) => Ok(Arc::new(GeminiEvaluatorProvider::new(c)?)),
    }
}
