use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricewatch_core::domain::signal::Signal;
use pricewatch_core::domain::snapshot::{DashboardSnapshot, NormalizedPoint, SignalRow, SummaryRow};
use pricewatch_core::domain::view::{self, Alert, FairValuePoint, Rankings, SnapshotFilter};
use pricewatch_core::storage::snapshot_files;

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

    // The worker may create the directory later; requests check it again.
    if let Err(e) = settings.require_snapshot_dir() {
        tracing::warn!(error = %e, "snapshot dir not ready; serving 404 until a snapshot is written");
    }

    let state = AppState {
        snapshot_dir: settings.snapshot_dir.clone(),
        dashboard_file: settings.dashboard_file.clone(),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboard", get(get_dashboard))
        .route("/assets/:asset", get(get_asset))
        .route("/assets/:asset/history", get(get_asset_history))
        .route("/rankings", get(get_rankings))
        .route("/alerts", get(get_alerts))
        .route("/fair-value", get(get_fair_value))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    snapshot_dir: PathBuf,
    dashboard_file: String,
}

impl AppState {
    /// Missing directory: nothing published yet (404). Not a directory: 500.
    async fn dir(&self) -> Result<&std::path::Path, StatusCode> {
        match tokio::fs::metadata(&self.snapshot_dir).await {
            Ok(meta) if meta.is_dir() => Ok(self.snapshot_dir.as_path()),
            Ok(_) => Err(internal(anyhow::anyhow!(
                "SNAPSHOT_DIR {} is not a directory",
                self.snapshot_dir.display()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StatusCode::NOT_FOUND),
            Err(e) => Err(internal(anyhow::Error::new(e).context(format!(
                "failed to stat SNAPSHOT_DIR {}",
                self.snapshot_dir.display()
            )))),
        }
    }

    async fn snapshot(&self) -> Result<DashboardSnapshot, StatusCode> {
        let path = self.dir().await?.join(&self.dashboard_file);
        snapshot_files::load_snapshot(&path)
            .await
            .map_err(internal)?
            .ok_or(StatusCode::NOT_FOUND)
    }
}

fn internal(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "snapshot read failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    category: Option<String>,
    signal: Option<String>,
}

impl DashboardQuery {
    fn into_filter(self) -> Result<SnapshotFilter, StatusCode> {
        let signal = match self.signal.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<Signal>().map_err(|_| StatusCode::BAD_REQUEST)?),
        };
        let category = self.category.filter(|c| !c.trim().is_empty());
        Ok(SnapshotFilter { category, signal })
    }
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSnapshot>, StatusCode> {
    let filter = query.into_filter()?;
    let snapshot = state.snapshot().await?;
    Ok(Json(view::filter(&snapshot, &filter)))
}

#[derive(Debug, Serialize)]
struct ApiAsset {
    updated_at: String,
    summary: SummaryRow,
    signal: SignalRow,
}

async fn get_asset(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> Result<Json<ApiAsset>, StatusCode> {
    let snapshot = state.snapshot().await?;

    let summary = snapshot
        .summary_for(&asset)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    let signal = snapshot
        .signal_for(&asset)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiAsset {
        updated_at: snapshot.updated_at,
        summary,
        signal,
    }))
}

async fn get_asset_history(
    State(state): State<AppState>,
    Path(asset): Path<String>,
) -> Result<Json<Vec<NormalizedPoint>>, StatusCode> {
    let snapshot = state.snapshot().await?;

    // Resolve through the snapshot so only published symbols map to file names.
    let symbol = snapshot
        .summary_for(&asset)
        .map(|r| r.asset.clone())
        .ok_or(StatusCode::NOT_FOUND)?;

    let history = snapshot_files::load_history(state.dir().await?, &symbol)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(history))
}

#[derive(Debug, Default, Deserialize)]
struct RankingsQuery {
    top: Option<usize>,
}

async fn get_rankings(
    State(state): State<AppState>,
    Query(query): Query<RankingsQuery>,
) -> Result<Json<Rankings>, StatusCode> {
    let top = query.top.unwrap_or(view::DEFAULT_TOP_N);
    if top == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let snapshot = state.snapshot().await?;
    Ok(Json(view::rankings(&snapshot, top)))
}

async fn get_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, StatusCode> {
    let snapshot = state.snapshot().await?;
    Ok(Json(view::alerts(&snapshot)))
}

async fn get_fair_value(
    State(state): State<AppState>,
) -> Result<Json<Vec<FairValuePoint>>, StatusCode> {
    let snapshot = state.snapshot().await?;
    Ok(Json(view::fair_value(&snapshot)))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
