//! Shinkan command-line entry point.

mod export;

use anyhow::Context;
use clap::Parser;
use shinkan_core::AppConfig;
use shinkan_db::{volumes, Database};
use shinkan_fetch::FetchClient;
use shinkan_scanner::Orchestrator;
use shinkan_series::{SeriesLoader, SeriesRegistry};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shinkan", version, about = "New-volume tracker for serialized print publications")]
struct Args {
    /// Config file path (defaults to the XDG config location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only scan series whose id or title contains this text
    #[arg(long)]
    series: Option<String>,

    /// Print store contents per series and exit
    #[arg(long)]
    list: bool,

    /// Where to write the JSON collection export (overrides config)
    #[arg(long)]
    export: Option<PathBuf>,

    /// Wall-clock limit for the whole run, in minutes (overrides config)
    #[arg(long)]
    timeout_minutes: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path).context("loading config")?,
        None => AppConfig::load().context("loading config")?,
    };
    config.apply_env();

    let db = Database::open(&config.scan.database_path)
        .await
        .context("opening store")?;

    if args.list {
        return list_store(&db).await;
    }

    let loader = SeriesLoader::new(&config.scan.series_dir).context("opening series directory")?;
    let registry = SeriesRegistry::load_from(&loader).context("loading series definitions")?;

    if let Some(filter) = args.series.clone() {
        let filter = filter.to_lowercase();
        let matching: Vec<_> = registry
            .all()
            .into_iter()
            .filter(|def| {
                def.id.as_str().to_lowercase().contains(&filter)
                    || def.title.to_lowercase().contains(&filter)
                    || def
                        .translated_title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&filter))
            })
            .collect();
        anyhow::ensure!(!matching.is_empty(), "no series matches filter '{filter}'");

        let filtered = SeriesRegistry::new();
        for def in matching {
            info!(series = %def.id, "selected by filter");
            filtered.insert(def);
        }
        return run_batch(args, config, db, filtered).await;
    }

    run_batch(args, config, db, registry).await
}

async fn run_batch(
    args: Args,
    config: AppConfig,
    db: Database,
    registry: SeriesRegistry,
) -> anyhow::Result<()> {
    anyhow::ensure!(!registry.is_empty(), "no series definitions loaded");
    info!(series = registry.len(), "tracked series loaded");

    let fetcher = FetchClient::new(config.catalog.base_url.clone(), config.pacing.clone())
        .context("building HTTP client")?;

    let timeout_minutes = args
        .timeout_minutes
        .unwrap_or(config.scan.batch_timeout_minutes);

    let orchestrator = Orchestrator::new(&db, &fetcher, &config);
    let run = tokio::time::timeout(
        Duration::from_secs(timeout_minutes * 60),
        orchestrator.run(&registry),
    )
    .await;

    let report = match run {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            // Per-operation commits mean everything written so far is
            // durable; the process still exits non-zero.
            error!(error = %e, "batch run failed; committed state is preserved");
            return Err(e.into());
        }
        Err(_) => {
            error!(
                timeout_minutes,
                "batch run timed out; committed state is preserved"
            );
            anyhow::bail!("batch run timed out after {timeout_minutes} minutes");
        }
    };

    for release in &report.new_releases {
        if release.date_changed {
            info!(
                series = %release.display_title,
                tome = ?release.tome,
                date = ?release.release_date,
                previous = ?release.previous_date,
                "release date changed"
            );
        } else {
            info!(
                series = %release.display_title,
                tome = ?release.tome,
                date = ?release.release_date,
                "new volume detected"
            );
        }
    }
    if !report.failed_series.is_empty() {
        warn!(series = ?report.failed_series, "series without results this run");
    }

    let export_path = args
        .export
        .unwrap_or_else(|| config.export.collection_path.clone());
    export::write_collection(&db, &report, &export_path).await?;

    db.close().await;
    Ok(())
}

/// `--list`: per-series aggregates from the store.
async fn list_store(db: &Database) -> anyhow::Result<()> {
    let summaries = volumes::series_summaries(db.pool())
        .await
        .context("querying store")?;

    if summaries.is_empty() {
        println!("store is empty");
        return Ok(());
    }

    for summary in summaries {
        let display = summary
            .translated_title
            .clone()
            .unwrap_or_else(|| summary.series.clone());
        let range = match (summary.tome_min, summary.tome_max) {
            (Some(lo), Some(hi)) => format!("T{lo}-T{hi}"),
            _ => "tomes unknown".to_string(),
        };
        println!("{display}: {} volume(s), {range}", summary.volume_count);

        let vols = volumes::for_series(
            db.pool(),
            &shinkan_core::SeriesId::new(&summary.series).context("series id from store")?,
        )
        .await?;
        for vol in vols {
            println!(
                "  {} T{} {} {}",
                vol.item_id,
                vol.tome.map_or_else(|| "?".to_string(), |t| t.to_string()),
                vol.release_date.unwrap_or_else(|| "?".to_string()),
                vol.publisher.unwrap_or_default()
            );
        }
    }

    Ok(())
}
