use crate::domain::series::PricePoint;
use crate::domain::signal::Signal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const UPDATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub updated_at: String,
    pub inflation_12m_pct: Option<f64>,
    pub summary: Vec<SummaryRow>,
    pub signals: Vec<SignalRow>,
}

/// Percentages are rounded to two decimals; `None` serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub asset: String,
    pub category: String,
    pub price: f64,
    pub return_1y_pct: Option<f64>,
    pub real_return_1y_pct: Option<f64>,
    pub return_5y_pct: Option<f64>,
    pub real_return_5y_pct: Option<f64>,
    pub volatility_pct: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub ma_1y: Option<f64>,
    pub high_1y: Option<f64>,
    pub observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub asset: String,
    pub category: String,
    pub price: f64,
    pub dist_ma_1y_pct: Option<f64>,
    pub dist_high_1y_pct: Option<f64>,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub date: NaiveDate,
    pub price_norm: f64,
}

impl From<(PricePoint, f64)> for NormalizedPoint {
    fn from((p, price_norm): (PricePoint, f64)) -> Self {
        Self {
            date: p.date,
            price_norm,
        }
    }
}

pub fn format_updated_at(now: DateTime<Utc>) -> String {
    now.format(UPDATED_AT_FORMAT).to_string()
}

impl DashboardSnapshot {
    pub fn summary_for(&self, asset: &str) -> Option<&SummaryRow> {
        self.summary
            .iter()
            .find(|r| r.asset.eq_ignore_ascii_case(asset))
    }

    pub fn signal_for(&self, asset: &str) -> Option<&SignalRow> {
        self.signals
            .iter()
            .find(|r| r.asset.eq_ignore_ascii_case(asset))
    }

    /// Checks the invariants a reader relies on: one summary row and one signal
    /// row per asset, in the same order.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.updated_at.trim().is_empty(),
            "updated_at must be non-empty"
        );
        anyhow::ensure!(
            self.summary.len() == self.signals.len(),
            "summary/signals length mismatch: {} vs {}",
            self.summary.len(),
            self.signals.len()
        );

        let mut seen = BTreeSet::new();
        for (s, g) in self.summary.iter().zip(&self.signals) {
            anyhow::ensure!(
                s.asset == g.asset,
                "summary/signals order mismatch: {} vs {}",
                s.asset,
                g.asset
            );
            anyhow::ensure!(
                seen.insert(s.asset.to_ascii_uppercase()),
                "duplicate asset in snapshot: {}",
                s.asset
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn snapshot_json() -> serde_json::Value {
        json!({
            "updated_at": "2026-01-27 10:00 UTC",
            "inflation_12m_pct": null,
            "summary": [{
                "asset": "IVV",
                "category": "us_etf",
                "price": 612.3,
                "return_1y_pct": 14.2,
                "real_return_1y_pct": null,
                "return_5y_pct": null,
                "real_return_5y_pct": null,
                "volatility_pct": 17.1,
                "max_drawdown_pct": -18.76,
                "ma_1y": 580.12,
                "high_1y": 620.0,
                "observations": 345
            }],
            "signals": [{
                "asset": "IVV",
                "category": "us_etf",
                "price": 612.3,
                "dist_ma_1y_pct": 5.55,
                "dist_high_1y_pct": -1.24,
                "signal": "REDUCE"
            }]
        })
    }

    #[test]
    fn parses_snapshot_with_null_fields() {
        let s: DashboardSnapshot = serde_json::from_value(snapshot_json()).unwrap();
        assert!(s.validate().is_ok());
        assert_eq!(s.inflation_12m_pct, None);
        assert_eq!(s.signals[0].signal, Signal::Reduce);
        assert_eq!(s.summary_for("ivv").unwrap().observations, 345);
        assert!(s.signal_for("QQQ").is_none());
    }

    #[test]
    fn validate_rejects_misaligned_rows() {
        let mut s: DashboardSnapshot = serde_json::from_value(snapshot_json()).unwrap();
        s.signals[0].asset = "QQQ".to_string();
        assert!(s.validate().is_err());

        s.signals.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn formats_updated_at_in_minutes() {
        let now = Utc.with_ymd_and_hms(2026, 1, 27, 21, 5, 59).unwrap();
        assert_eq!(format_updated_at(now), "2026-01-27 21:05 UTC");
    }
}
