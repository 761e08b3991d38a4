use std::path::PathBuf;
use std::time::Duration;

use cex_ai::{EvaluatorProviderConfig, ProviderError};
use tracing::{info, warn};

pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_DB_PATH: &str = "./data/cex-db.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: String,
    pub db_path: PathBuf,
    /// Server-wide AI evaluator; requests may still bring their own key.
    pub ai: Option<EvaluatorProviderConfig>,
    pub ai_timeout: Duration,
    /// Idle limit for reads and writes on one HTTP connection.
    pub http_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr = var("CEX_HTTP_ADDR")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{}", port.trim())))
            .unwrap_or_else(|| {
                info!("CEX_HTTP_ADDR not set, using default: {DEFAULT_HTTP_ADDR}");
                DEFAULT_HTTP_ADDR.to_string()
            });
        let db_path = PathBuf::from(var("CEX_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()));
        let ai_timeout = Duration::from_secs(env_u64(&var, "CEX_AI_TIMEOUT_SECS", 15, 1, 120));
        let http_timeout = Duration::from_secs(env_u64(&var, "CEX_HTTP_TIMEOUT_SECS", 10, 1, 300));

        let ai = match ai_config_from_vars(&var) {
            Ok(cfg) => cfg.map(|c| c.with_timeout(ai_timeout)),
            Err(err) => {
                warn!("AI evaluator disabled: {err}");
                None
            }
        };

        Self {
            http_addr,
            db_path,
            ai,
            ai_timeout,
            http_timeout,
        }
    }
}

fn ai_config_from_vars<F>(var: &F) -> Result<Option<EvaluatorProviderConfig>, ProviderError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(provider) = var("CEX_AI_PROVIDER").filter(|p| !p.trim().is_empty()) else {
        return Ok(None);
    };
    let fallback_key = match provider.trim().to_ascii_lowercase().as_str() {
        "gemini" => "GEMINI_API_KEY",
        _ => "OPENAI_API_KEY",
    };
    let api_key = var("CEX_AI_API_KEY")
        .or_else(|| var(fallback_key))
        .ok_or_else(|| {
            ProviderError::Config(format!(
                "CEX_AI_API_KEY or {fallback_key} is not configured"
            ))
        })?;

    let mut cfg = EvaluatorProviderConfig::from_parts(&provider, api_key, var("CEX_AI_MODEL"))?;
    if let Some(base_url) = var("CEX_AI_BASE_URL") {
        cfg = cfg.with_base_url(base_url);
    }
    Ok(Some(cfg))
}

fn env_u64<F>(var: &F, name: &str, default: u64, min: u64, max: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}
