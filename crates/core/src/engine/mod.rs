pub mod history;
pub mod metrics;
pub mod rules;

use crate::config::env_parse;
use crate::domain::asset::Asset;
use crate::domain::series::PriceSeries;
use crate::domain::signal::Signal;
use crate::domain::snapshot::{NormalizedPoint, SignalRow, SummaryRow};
use metrics::{round2, to_pct, TRADING_DAYS_PER_YEAR};
use rules::SignalThresholds;

const DEFAULT_MIN_HISTORY: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub ma_window: usize,
    pub high_window: usize,
    pub annualization: usize,
    pub horizon_1y: usize,
    pub horizon_5y: usize,
    /// Assets with fewer observations are skipped entirely.
    pub min_history: usize,
    pub thresholds: SignalThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ma_window: TRADING_DAYS_PER_YEAR,
            high_window: TRADING_DAYS_PER_YEAR,
            annualization: TRADING_DAYS_PER_YEAR,
            horizon_1y: TRADING_DAYS_PER_YEAR,
            horizon_5y: TRADING_DAYS_PER_YEAR * 5,
            min_history: DEFAULT_MIN_HISTORY,
            thresholds: SignalThresholds::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(n) = env_parse::<usize>("ENGINE_MA_WINDOW")? {
            out.ma_window = n;
        }
        if let Some(n) = env_parse::<usize>("ENGINE_HIGH_WINDOW")? {
            out.high_window = n;
        }
        if let Some(n) = env_parse::<usize>("ENGINE_MIN_HISTORY")? {
            if n < DEFAULT_MIN_HISTORY {
                tracing::warn!(
                    min_history = n,
                    default = DEFAULT_MIN_HISTORY,
                    "ENGINE_MIN_HISTORY is below the default minimum-history gate"
                );
            }
            out.min_history = n;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.ma_window >= 1, "ma_window must be >= 1");
        anyhow::ensure!(self.high_window >= 1, "high_window must be >= 1");
        anyhow::ensure!(self.annualization >= 1, "annualization must be >= 1");
        anyhow::ensure!(
            self.horizon_1y >= 2 && self.horizon_5y >= 2,
            "return horizons must be >= 2 observations"
        );
        anyhow::ensure!(self.min_history >= 1, "min_history must be >= 1");
        self.thresholds.validate()
    }
}

/// Raw metrics as fractions; `None` where the window was too short.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub price: f64,
    pub return_1y: Option<f64>,
    pub real_return_1y: Option<f64>,
    pub return_5y: Option<f64>,
    pub real_return_5y: Option<f64>,
    pub volatility: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub ma_1y: Option<f64>,
    pub high_1y: Option<f64>,
    pub dist_ma_1y: Option<f64>,
    pub dist_high_1y: Option<f64>,
    pub observations: usize,
}

impl MetricsRecord {
    pub fn summary_row(&self, asset: &Asset) -> SummaryRow {
        SummaryRow {
            asset: asset.symbol.clone(),
            category: asset.category.clone(),
            price: round2(self.price),
            return_1y_pct: to_pct(self.return_1y),
            real_return_1y_pct: to_pct(self.real_return_1y),
            return_5y_pct: to_pct(self.return_5y),
            real_return_5y_pct: to_pct(self.real_return_5y),
            volatility_pct: to_pct(self.volatility),
            max_drawdown_pct: to_pct(self.max_drawdown),
            ma_1y: self.ma_1y.map(round2),
            high_1y: self.high_1y.map(round2),
            observations: self.observations,
        }
    }

    pub fn signal_row(&self, asset: &Asset, signal: Signal) -> SignalRow {
        SignalRow {
            asset: asset.symbol.clone(),
            category: asset.category.clone(),
            price: round2(self.price),
            dist_ma_1y_pct: to_pct(self.dist_ma_1y),
            dist_high_1y_pct: to_pct(self.dist_high_1y),
            signal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetEvaluation {
    pub metrics: MetricsRecord,
    pub signal: Signal,
    pub history: Vec<NormalizedPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: EngineConfig,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn meets_min_history(&self, series: &PriceSeries) -> bool {
        series.len() >= self.config.min_history
    }

    pub fn compute_metrics(&self, series: &PriceSeries, inflation: Option<f64>) -> MetricsRecord {
        let cfg = &self.config;
        let closes = series.closes();
        let price = series.last().close;

        let return_1y = metrics::annualized_return(&closes, cfg.horizon_1y, cfg.annualization);
        let return_5y = metrics::annualized_return(&closes, cfg.horizon_5y, cfg.annualization);

        let ma_1y = metrics::moving_average(&closes, cfg.ma_window);
        let high_1y = metrics::trailing_high(&closes, cfg.high_window);

        MetricsRecord {
            price,
            return_1y,
            real_return_1y: metrics::real_return(return_1y, inflation),
            return_5y,
            real_return_5y: metrics::real_return(return_5y, inflation),
            volatility: metrics::volatility(&closes, cfg.annualization),
            max_drawdown: metrics::max_drawdown(&closes),
            ma_1y,
            high_1y,
            dist_ma_1y: metrics::distance(price, ma_1y),
            dist_high_1y: metrics::distance(price, high_1y),
            observations: closes.len(),
        }
    }

    pub fn evaluate(&self, series: &PriceSeries, inflation: Option<f64>) -> AssetEvaluation {
        let metrics = self.compute_metrics(series, inflation);
        let signal = rules::derive_signal(
            metrics.dist_ma_1y,
            metrics.dist_high_1y,
            &self.config.thresholds,
        );

        AssetEvaluation {
            metrics,
            signal,
            history: history::normalize(series),
        }
    }
}
