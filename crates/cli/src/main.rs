mod check;
mod cli;
mod policy;

use anyhow::{Context, Result};
use clap::Parser;
use sqlrisk_core::{config::load_dotenv, Config, StoreKind};
use sqlrisk_rules::{open_store, PolicyRegistry};
use tracing::info;

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = load_config(&args).context("failed to load configuration")?;
    config.log_summary();

    match args.command {
        Command::Policy { action } => policy::run(&config.store, action),
        Command::Check(check) => {
            let store = open_store(&config.store).with_context(|| {
                format!("failed to open policy store {}", config.store.path.display())
            })?;
            let registry = PolicyRegistry::open(store.as_ref()).context("failed to load policies")?;
            let snapshot = registry.snapshot();
            info!(policies = snapshot.len(), "policies loaded");
            check::run(snapshot, config.risk, check)
        }
    }
}

/// Environment config, then command-line overrides.
fn load_config(args: &CliArgs) -> Result<Config> {
    let mut config = match &args.profile {
        Some(profile) => Config::for_profile(profile)?,
        None => Config::from_env()?,
    };

    if let Some(store) = &args.store {
        let kind: StoreKind = store.parse()?;
        if kind != config.store.kind && args.policy_path.is_none() {
            config.store.path = kind.default_path();
        }
        config.store.kind = kind;
    }
    if let Some(path) = &args.policy_path {
        config.store.path = path.clone();
    }
    Ok(config)
}
