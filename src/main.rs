//! modelrouter - traffic management core for AI model routing
//!
//! Loads a router configuration, starts health checking and limiter cleanup,
//! and runs until interrupted.

#![allow(missing_docs)]

use anyhow::Context;
use clap::Parser;
use modelrouter::{Config, TrafficManager};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "modelrouter", version, about = "AI model traffic manager")]
struct Args {
    /// Router configuration file
    #[arg(short, long, env = "MODELROUTER_CONFIG", default_value = "config/router.yaml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!(
        "modelrouter {} (git {}, built {})",
        modelrouter::VERSION,
        env!("GIT_HASH"),
        env!("BUILD_TIME")
    );

    let config = Config::from_file(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?
        .with_env_overrides()?;

    if args.check {
        println!("{}", config.to_yaml()?);
        info!("Configuration is valid");
        return Ok(());
    }

    let traffic = Arc::new(TrafficManager::new(config.gateway).context("building traffic manager")?);
    traffic.start();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received");
    traffic.shutdown();
    Ok(())
}
