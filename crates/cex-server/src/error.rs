use std::io;

use cex_ai::ProviderError;
use cex_core::FieldError;
use cex_storage::StorageError;
use serde_json::json;
use thiserror::Error;

use crate::http::HttpResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("JSON payload missing or invalid.")]
    MalformedPayload,

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Airport not found")]
    AirportNotFound,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("AI evaluation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("CEX calculation error: {0}")]
    UpstreamScores(FieldError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::MalformedPayload | Self::Field(_) | Self::BadRequest(_) => 400,
            Self::Provider(ProviderError::Config(_)) => 400,
            Self::Storage(StorageError::InvalidInput(_)) => 400,
            Self::AirportNotFound | Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Provider(_) | Self::UpstreamScores(_) => 502,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

impl From<ApiError> for HttpResponse {
    fn from(err: ApiError) -> Self {
        Self::json(err.status(), &json!({ "error": err.to_string() }))
    }
}

/// Failures while bringing the server up.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("storage init failed: {0}")]
    Storage(#[from] StorageError),

    #[error("AI provider init failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("runtime init failed: {0}")]
    Runtime(#[from] io::Error),
}
