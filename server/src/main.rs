use clap::Parser;
use tracing_subscriber::EnvFilter;

use lanchat_server::config::{generate_config_template, CliArgs, Config};
use lanchat_server::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();

    // Handle --generate-config: print template and exit
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load(&cli)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lanchat_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!("lanchat relay v{} starting", env!("CARGO_PKG_VERSION"));

    let addr = config.socket_addr()?;
    let server = Server::bind(addr, config.relay_settings()).await?;
    tracing::info!("Server started on port: {}", server.local_addr().port());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.shutdown().await;

    Ok(())
}
