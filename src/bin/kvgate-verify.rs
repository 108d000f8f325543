//! Smoke-tests a running kvgate service end to end.
//!
//! Exit code 0 when every scenario passed, 1 otherwise (including when the
//! service never reports a connected store).

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use kvgate::config::LogConfig;
use kvgate::verify::scenario::run_id;
use kvgate::verify::{VerifyError, VerifyOptions, Verifier};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "kvgate-verify", version, about = "End-to-end checks against a running kvgate")]
struct Args {
  /// Base URL of the service
  #[arg(long, env = "BASE_URL", default_value = "http://localhost:3000")]
  base_url: String,
  /// Readiness probes before giving up
  #[arg(long, default_value_t = 25)]
  attempts: u32,
  /// Pause between readiness probes
  #[arg(long, default_value_t = 2000)]
  interval_ms: u64,
  /// Timeout of one readiness probe
  #[arg(long, default_value_t = 1900)]
  probe_timeout_ms: u64,
  /// Timeout of one scenario request
  #[arg(long, default_value_t = 10_000)]
  request_timeout_ms: u64,
}

impl From<Args> for VerifyOptions {
  fn from(args: Args) -> Self {
    VerifyOptions {
      base_url: args.base_url,
      attempts: args.attempts,
      interval: Duration::from_millis(args.interval_ms),
      probe_timeout: Duration::from_millis(args.probe_timeout_ms),
      request_timeout: Duration::from_millis(args.request_timeout_ms),
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  let options = VerifyOptions::from(Args::parse());
  kvgate::logging::init(&LogConfig::default())?;

  info!("Verifying service at {}", options.base_url);
  let verifier = Verifier::new(options)?;

  let tally = match verifier.run(run_id()).await {
    Ok(tally) => tally,
    Err(e @ VerifyError::NotReady { .. }) => {
      error!("{}; no scenarios were run", e);
      return Ok(ExitCode::FAILURE);
    }
    Err(e) => return Err(e.into()),
  };

  println!("{}", tally);
  for name in &tally.failures {
    println!("  failed: {}", name);
  }

  Ok(ExitCode::from(tally.exit_code()))
}
