use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// CosmoWeather: city geocoding and forecasts behind one endpoint
#[derive(Debug, Parser)]
#[command(name = "cosmoweather", version)]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    cosmo_core::init()?;

    let (mut config, _) = cosmo_core::Config::load_validated(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let app = cosmo_server::App::new(config)?;

    app.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    })
    .await
}
