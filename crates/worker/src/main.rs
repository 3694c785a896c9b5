use anyhow::Context;
use clap::Parser;
use pricewatch_core::engine::{EngineConfig, MetricsEngine};
use pricewatch_core::ingest::source::InflationSource;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "pricewatch_worker")]
struct Args {
    /// Asset universes merged into one snapshot; repeat or comma-separate.
    #[arg(
        long = "universe",
        value_enum,
        value_delimiter = ',',
        default_values_t = [universe::UniversePreset::BrEtfs]
    )]
    universes: Vec<universe::UniversePreset>,

    /// Comma-separated provider tickers replacing the preset's list (falls back to UNIVERSE_TICKERS).
    #[arg(long)]
    tickers: Option<String>,

    /// Output directory. Defaults to SNAPSHOT_DIR.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Snapshot file name inside the output directory. Defaults to DASHBOARD_FILE.
    #[arg(long)]
    dashboard_file: Option<String>,

    /// Skip the inflation lookup; real returns are left empty.
    #[arg(long)]
    no_inflation: bool,

    /// Do everything except writing files; the snapshot is printed to stdout.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = pricewatch_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let tickers = args.tickers.as_deref().or(settings.universe_tickers.as_deref());
    let universes = universe::resolve_universes(&args.universes, tickers)?;
    let engine = MetricsEngine::new(EngineConfig::from_env()?);
    let source = pricewatch_core::ingest::yahoo::YahooChartClient::from_settings(&settings)?;

    let out_dir = args.out_dir.clone().unwrap_or_else(|| settings.snapshot_dir.clone());
    let dashboard_file = args
        .dashboard_file
        .clone()
        .unwrap_or_else(|| settings.dashboard_file.clone());
    anyhow::ensure!(
        !dashboard_file.is_empty() && !dashboard_file.contains('/') && !dashboard_file.contains('\\'),
        "--dashboard-file must be a bare file name (got {dashboard_file})"
    );

    let _lock = if args.dry_run {
        None
    } else {
        match pricewatch_core::storage::lock::try_acquire_run_lock(&out_dir)? {
            Some(lock) => {
                tracing::debug!(lock = %lock.path().display(), "run lock acquired");
                Some(lock)
            }
            None => {
                tracing::warn!(out_dir = %out_dir.display(), "run lock not acquired; another run in progress");
                return Ok(());
            }
        }
    };

    let inflation = if universes.iter().any(|u| u.use_inflation) && !args.no_inflation {
        fetch_inflation(&settings).await
    } else {
        None
    };

    let now = chrono::Utc::now();
    let mut merged: Option<pricewatch_core::pipeline::DashboardRun> = None;
    for universe in &universes {
        tracing::info!(
            universe = ?universe.preset,
            assets = universe.assets.len(),
            lookback = %universe.lookback,
            inflation = ?inflation.filter(|_| universe.use_inflation),
            dry_run = args.dry_run,
            "dashboard run starting"
        );

        let opts = pricewatch_core::pipeline::RunOptions::from_env(universe.lookback)?;
        let run = pricewatch_core::pipeline::run_dashboard(
            &universe.assets,
            &source,
            &engine,
            inflation.filter(|_| universe.use_inflation),
            &opts,
            now,
        )
        .await;

        merged = Some(match merged.take() {
            Some(mut acc) => {
                acc.extend(run);
                acc
            }
            None => run,
        });
    }
    let run = merged.context("no universe selected")?;

    if run.snapshot.summary.is_empty() {
        let err = anyhow::anyhow!(
            "no asset produced a record ({} skipped); keeping the previous snapshot",
            run.skipped.len()
        );
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "dashboard run produced nothing");
        return Err(err);
    }

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&run.snapshot)?);
        tracing::info!(
            included = run.snapshot.summary.len(),
            skipped = run.skipped.len(),
            dry_run = true,
            "dashboard run finished"
        );
        return Ok(());
    }

    let path =
        pricewatch_core::storage::snapshot_files::write_run(&out_dir, &dashboard_file, &run)
            .await
            .map_err(|err| {
                sentry_anyhow::capture_anyhow(&err);
                err
            })?;

    tracing::info!(
        path = %path.display(),
        included = run.snapshot.summary.len(),
        skipped = run.skipped.len(),
        "dashboard snapshot written"
    );

    Ok(())
}

/// Inflation is optional: any failure is reported and the run continues without it.
async fn fetch_inflation(settings: &pricewatch_core::config::Settings) -> Option<f64> {
    let client = match pricewatch_core::ingest::sgs::SgsClient::from_settings(settings) {
        Ok(c) => c,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::warn!(error = %err, "inflation source misconfigured; continuing without inflation");
            return None;
        }
    };

    match client.fetch_inflation_12m(client.series_id()).await {
        Ok(Some(v)) => {
            tracing::info!(series_id = client.series_id(), inflation_12m = v, "inflation reference loaded");
            Some(v)
        }
        Ok(None) => {
            tracing::warn!(series_id = client.series_id(), "inflation series returned no data");
            None
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::warn!(error = %err, "inflation fetch failed; continuing without inflation");
            None
        }
    }
}

fn init_sentry(settings: &pricewatch_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
