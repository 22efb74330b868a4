//! pwlookup-server: serves user directory lookups over the Martinu protocol.

use pwlookup::config::Config;
use pwlookup::directory;
use pwlookup::logging;
use pwlookup::server::Server;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    logging::init(&config.log_level, std::io::stdout);

    info!(
        bind = %config.bind,
        port = config.port,
        passwd = ?config.passwd,
        backlog = config.backlog,
        max_connections = config.max_connections,
        session_timeout = ?config.session_timeout,
        "Starting pwlookup server"
    );

    let directory = directory::open(config.passwd.as_deref());
    let server = Server::bind(&config, directory)?;
    server.run().await?;

    Ok(())
}
