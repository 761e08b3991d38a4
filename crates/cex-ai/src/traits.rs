use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{EvaluationPrompt, EvaluatorResponse};

#[async_trait]
pub trait EvaluatorProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, prompt: EvaluationPrompt)
    -> Result<EvaluatorResponse, ProviderError>;
}
