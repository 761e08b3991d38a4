use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPrompt {
    pub airport: String,
    pub iata: String,
}

impl EvaluationPrompt {
    pub fn new(airport: impl Into<String>, iata: impl Into<String>) -> Self {
        Self {
            airport: airport.into(),
            iata: iata.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatorResponse {
    pub provider: String,
    pub model: String,
    /// Sub-metric keys as returned by the model; values are not validated here.
    pub metrics: Map<String, Value>,
}
