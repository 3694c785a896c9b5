use crate::config::env_parse;
use crate::domain::asset::Asset;
use crate::domain::snapshot::{format_updated_at, DashboardSnapshot, NormalizedPoint};
use crate::engine::metrics::to_pct;
use crate::engine::MetricsEngine;
use crate::ingest::source::{Lookback, PriceSource};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_REQ_DELAY_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub lookback: Lookback,
    /// Pause between consecutive source requests.
    pub req_delay: Duration,
}

impl RunOptions {
    pub fn new(lookback: Lookback) -> Self {
        Self {
            lookback,
            req_delay: Duration::from_millis(DEFAULT_REQ_DELAY_MS),
        }
    }

    pub fn from_env(lookback: Lookback) -> anyhow::Result<Self> {
        let req_delay_ms =
            env_parse::<u64>("PRICE_SOURCE_REQ_DELAY_MS")?.unwrap_or(DEFAULT_REQ_DELAY_MS);

        Ok(Self {
            lookback,
            req_delay: Duration::from_millis(req_delay_ms),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAsset {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct DashboardRun {
    pub snapshot: DashboardSnapshot,
    /// Normalized history per included asset, keyed by symbol, in snapshot order.
    pub histories: Vec<(String, Vec<NormalizedPoint>)>,
    pub skipped: Vec<SkippedAsset>,
}

impl DashboardRun {
    /// Appends `other` after this run's records, e.g. a second universe with
    /// its own lookback. A symbol already present keeps its first record and
    /// the later one is listed in `skipped`.
    pub fn extend(&mut self, other: DashboardRun) {
        if self.snapshot.inflation_12m_pct.is_none() {
            self.snapshot.inflation_12m_pct = other.snapshot.inflation_12m_pct;
        }

        let mut seen: BTreeSet<String> = self
            .snapshot
            .summary
            .iter()
            .map(|r| r.asset.to_ascii_uppercase())
            .collect();

        let rows = other
            .snapshot
            .summary
            .into_iter()
            .zip(other.snapshot.signals)
            .zip(other.histories);
        for ((summary, signal), history) in rows {
            if !seen.insert(summary.asset.to_ascii_uppercase()) {
                tracing::warn!(symbol = %summary.asset, "skipping asset already in the snapshot");
                self.skipped.push(SkippedAsset {
                    symbol: summary.asset,
                    reason: "duplicate symbol".to_string(),
                });
                continue;
            }
            self.snapshot.summary.push(summary);
            self.snapshot.signals.push(signal);
            self.histories.push(history);
        }

        self.skipped.extend(other.skipped);
    }
}

/// Evaluates `assets` one at a time, in order.
///
/// An asset the source has no data for, that fails to fetch, or that has
/// fewer observations than the engine's minimum history is left out of every
/// output and listed in `skipped`. No single asset can fail the run.
pub async fn run_dashboard(
    assets: &[Asset],
    source: &dyn PriceSource,
    engine: &MetricsEngine,
    inflation: Option<f64>,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> DashboardRun {
    let mut summary = Vec::with_capacity(assets.len());
    let mut signals = Vec::with_capacity(assets.len());
    let mut histories = Vec::with_capacity(assets.len());
    let mut skipped = Vec::new();
    let mut seen = BTreeSet::new();

    let total = assets.len();
    for (idx, asset) in assets.iter().enumerate() {
        let mut skip = |reason: String| {
            tracing::warn!(
                idx,
                symbol = %asset.symbol,
                ticker = %asset.ticker,
                %reason,
                "skipping asset"
            );
            skipped.push(SkippedAsset {
                symbol: asset.symbol.clone(),
                reason,
            });
        };

        if let Err(err) = asset.validate() {
            skip(format!("invalid asset: {err:#}"));
            continue;
        }
        if !seen.insert(asset.symbol.to_ascii_uppercase()) {
            skip("duplicate symbol".to_string());
            continue;
        }

        if idx != 0 && !opts.req_delay.is_zero() {
            tokio::time::sleep(opts.req_delay).await;
        }

        let series = match source.fetch_series(&asset.ticker, opts.lookback).await {
            Ok(Some(series)) => series,
            Ok(None) => {
                skip(format!("no data from {}", source.source_name()));
                continue;
            }
            Err(err) => {
                skip(format!("fetch failed: {err:#}"));
                continue;
            }
        };

        if !engine.meets_min_history(&series) {
            skip(format!(
                "insufficient history: {} observations < {}",
                series.len(),
                engine.config().min_history
            ));
            continue;
        }

        let eval = engine.evaluate(&series, inflation);

        tracing::info!(
            processed = idx + 1,
            total,
            symbol = %asset.symbol,
            observations = eval.metrics.observations,
            price = eval.metrics.price,
            signal = %eval.signal,
            "asset evaluated"
        );

        summary.push(eval.metrics.summary_row(asset));
        signals.push(eval.metrics.signal_row(asset, eval.signal));
        histories.push((asset.symbol.clone(), eval.history));
    }

    DashboardRun {
        snapshot: DashboardSnapshot {
            updated_at: format_updated_at(now),
            inflation_12m_pct: to_pct(inflation),
            summary,
            signals,
        },
        histories,
        skipped,
    }
}
