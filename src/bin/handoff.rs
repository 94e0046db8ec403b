//! Moves `0..items` from producers to consumers through one bounded queue and
//! prints where everything ended up.
//!
//! Usage: handoff [CONFIG.toml]

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use handoff::{Pipeline, TransferConfig};

fn load_config() -> Result<TransferConfig> {
    match env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => TransferConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(TransferConfig::default()),
    }
}

fn main() -> Result<()> {
    let config = load_config()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter.as_str().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let source: Vec<u64> = (0..config.items as u64).collect();
    let pipeline = Pipeline::new(config).context("invalid transfer config")?;
    let outcome = pipeline.run(source.clone()).context("transfer failed")?;

    println!("{} {:?}", "Source:      ".bold(), source);
    for (report, items) in outcome.consumers.iter().zip(outcome.destinations()) {
        println!("{} {:?}", format!("{:<13}", report.name).cyan(), items);
    }

    let merged = outcome.merged_sorted();
    if merged == source {
        println!("{}", format!("all {} items delivered exactly once", merged.len()).green());
    } else {
        println!(
            "{}",
            format!("delivered {} of {} items", merged.len(), source.len()).red()
        );
        anyhow::bail!("destinations do not match the source");
    }

    Ok(())
}
