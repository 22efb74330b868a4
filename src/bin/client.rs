//! pwlookup-client: sends one lookup and prints the result lines.

use pwlookup::client::Client;
use pwlookup::config::ClientConfig;
use pwlookup::logging;
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load();

    // stdout carries results only
    logging::init(&config.log_level, std::io::stderr);

    let client = Client::new(&config);
    let stdout = std::io::stdout();
    let printed = client.run(&config.command, &mut stdout.lock()).await?;
    debug!(lines = printed, "Response complete");

    Ok(())
}
