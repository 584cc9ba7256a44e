//! Populate the public id mapping table for rows that predate it.
//!
//! ```sh
//! backfill_public_ids --database-url postgres://localhost/app --config ids.yaml --app catalog
//! backfill_public_ids --config ids.yaml --app catalog --model widget --pk 42
//! ```

use anyhow::{Result, bail};
use baseapp_ids::backfill::{BackfillReport, Backfiller};
use baseapp_ids::config::IdsConfig;
use baseapp_ids::storage::PostgresStore;
use baseapp_ids::storage::postgres::ensure_schema;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "backfill_public_ids", version)]
/// Create missing public id mapping entries in batches
struct Args {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Path to the YAML model configuration
    #[arg(long, short, env = "BASEAPP_IDS_CONFIG", default_value = "ids.yaml")]
    config: PathBuf,

    /// Only backfill models of this app
    #[arg(long)]
    app: Option<String>,

    /// Only backfill this model (requires --app)
    #[arg(long, requires = "app")]
    model: Option<String>,

    /// Only backfill this primary key (requires --model)
    #[arg(long, requires = "model")]
    pk: Option<i64>,

    /// Rows per batch; defaults to `backfill.batch_size` from the config
    #[arg(long)]
    batch_size: Option<usize>,

    /// Count what would be created without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when some batches failed and a rerun is needed
async fn run(args: Args) -> Result<bool> {
    let config = IdsConfig::from_yaml_file(&args.config.to_string_lossy())?.with_env_overrides()?;
    let registry = Arc::new(config.build_registry()?);
    let batch_size = args.batch_size.unwrap_or(config.backfill.batch_size);
    let dry_run = args.dry_run || config.backfill.dry_run;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&args.database_url)
        .await?;
    ensure_schema(&pool).await?;

    let store = Arc::new(PostgresStore::new(pool, registry.clone()));
    let backfiller = Backfiller::from_store(registry.clone(), store).dry_run(dry_run);

    let reports = match (args.app.as_deref(), args.model.as_deref(), args.pk) {
        (Some(app), Some(model), Some(pk)) => {
            let created = backfiller.backfill_single_instance(app, model, pk).await?;
            tracing::info!(app, model, pk, created, dry_run, "single instance backfill done");
            return Ok(true);
        }
        (Some(app), Some(model), None) => {
            let Some(descriptor) = registry.by_app_model(app, model) else {
                bail!("Unknown model {}.{}", app, model);
            };
            vec![backfiller.backfill_model(descriptor, batch_size).await?]
        }
        (app, _, _) => backfiller.backfill_all_models(batch_size, app).await?,
    };

    for report in &reports {
        println!("{}", serde_json::to_string(report)?);
    }
    tracing::info!(
        models = reports.len(),
        created = BackfillReport::total_created(&reports),
        dry_run,
        "backfill complete"
    );
    Ok(reports.iter().all(BackfillReport::is_complete))
}
