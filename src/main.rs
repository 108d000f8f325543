use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kvgate::{Config, Server};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "kvgate", version, about = "HTTP gateway to a Redis store")]
struct Args {
  /// TOML configuration file
  #[arg(long)]
  config: Option<PathBuf>,
  /// HTTP port, overrides PORT
  #[arg(long)]
  port: Option<u16>,
  /// Store address, overrides REDIS_URL
  #[arg(long)]
  redis_url: Option<String>,
  /// Delay before connecting to the store, overrides WARMUP_MS
  #[arg(long)]
  warmup_ms: Option<u64>,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
  let config = match &args.config {
    Some(path) => Config::from_file(path)?,
    None => Config::default(),
  };
  let mut config = config.apply_env(|name| std::env::var(name).ok())?;

  if let Some(port) = args.port {
    config.port = port;
  }
  if let Some(url) = &args.redis_url {
    config.redis_url = url.clone();
  }
  if let Some(warmup) = args.warmup_ms {
    config.warmup_ms = warmup;
  }
  Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();
  let config = load_config(&args).context("failed to load configuration")?;

  // Initialize logging
  kvgate::logging::init(&config.log)?;

  info!("Starting kvgate {}", env!("CARGO_PKG_VERSION"));
  info!("Store address: {}", config.redis_url);

  let server = match Server::start(&config).await {
    Ok(server) => server,
    Err(e) => {
      error!("Startup failed: {}", e);
      return Err(e.into());
    }
  };
  info!("Server listening on: {}", server.local_addr());

  server.run().await?;
  Ok(())
}
