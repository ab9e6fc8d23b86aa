//! model-import: Import a hub transformer model into a cluster's
//! trained-model registry.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ml_registry::redact_url;
use model_import::{Cli, ImportSettings, run_import};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Respects RUST_LOG, defaults to info (or debug with --verbose)
    let default_filter = if cli.verbose {
        "debug,model_import=debug,hub_artifacts=debug,ml_registry=debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = ImportSettings::from_cli(cli).context("Invalid settings")?;
    info!("Importing {} for task {}", settings.model, settings.task);
    info!("Output directory: {}", settings.output_dir.display());
    info!("Cluster: {}", redact_url(&settings.connection.url));

    let source = settings.model_source().context("Failed to set up model source")?;
    let request = settings.import_request()?;

    let outcome = {
        let registry = settings
            .registry()
            .context("Failed to create registry client")?;
        run_import(source.as_ref(), &registry, &request).await
    };

    match outcome {
        Ok(outcome) => {
            info!(
                "Registered {} ({} parts, {} bytes{})",
                outcome.model_id,
                outcome.summary.total_parts,
                outcome.summary.total_bytes,
                if outcome.summary.replaced {
                    ", replaced existing model"
                } else {
                    ""
                }
            );
            if outcome.summary.started {
                info!("Deployment started for {}", outcome.model_id);
            }
            if !outcome.cleaned_up {
                info!("Artifacts kept in {}", settings.output_dir.display());
            }
            Ok(())
        }
        Err(e) => {
            error!(stage = ?e.stage(), "Import failed");
            Err(e).context(format!("Failed to import {}", settings.model))
        }
    }
}
