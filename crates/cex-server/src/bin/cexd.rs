use std::io;

use cex_server::{CexServer, ServerConfig, init_tracing};
use tracing::error;

fn main() -> io::Result<()> {
    init_tracing();
    let config = ServerConfig::from_env();
    let server = CexServer::from_config(&config).map_err(|err| {
        error!("cexd failed to start: {err}");
        io::Error::other(err.to_string())
    })?;
    server.serve_http(&config.http_addr)
}
