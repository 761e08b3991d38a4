pub mod gemini;
pub mod openai;

pub use gemini::GeminiEvaluatorProvider;
pub use openai::OpenAiEvaluatorProvider;
