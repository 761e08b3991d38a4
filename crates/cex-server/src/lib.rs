pub mod config;
pub mod error;
pub mod http;
pub mod server;

pub use config::ServerConfig;
pub use error::{ApiError, InitError};
pub use http::{HttpRequest, HttpResponse};
pub use server::CexServer;

use tracing_subscriber::{EnvFilter, fmt};

/// Installs the stderr log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
