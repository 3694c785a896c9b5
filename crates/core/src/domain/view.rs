//! Read-side views over a dashboard snapshot.

use crate::domain::signal::Signal;
use crate::domain::snapshot::{DashboardSnapshot, SummaryRow};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub const DEFAULT_TOP_N: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub category: Option<String>,
    pub signal: Option<Signal>,
}

impl SnapshotFilter {
    fn keeps(&self, category: &str, signal: Signal) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map_or(true, |c| c.trim().eq_ignore_ascii_case(category));
        let signal_ok = self.signal.map_or(true, |s| s == signal);
        category_ok && signal_ok
    }
}

/// Keeps assets matching every set filter; summary and signal rows stay aligned.
pub fn filter(snapshot: &DashboardSnapshot, f: &SnapshotFilter) -> DashboardSnapshot {
    let kept: BTreeSet<&str> = snapshot
        .signals
        .iter()
        .filter(|r| f.keeps(&r.category, r.signal))
        .map(|r| r.asset.as_str())
        .collect();

    DashboardSnapshot {
        updated_at: snapshot.updated_at.clone(),
        inflation_12m_pct: snapshot.inflation_12m_pct,
        summary: snapshot
            .summary
            .iter()
            .filter(|r| kept.contains(r.asset.as_str()))
            .cloned()
            .collect(),
        signals: snapshot
            .signals
            .iter()
            .filter(|r| kept.contains(r.asset.as_str()))
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAsset {
    pub asset: String,
    pub value_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub best_real_return_1y: Vec<RankedAsset>,
    pub lowest_volatility: Vec<RankedAsset>,
}

fn rank_by(
    rows: &[SummaryRow],
    top_n: usize,
    key: impl Fn(&SummaryRow) -> Option<f64>,
    descending: bool,
) -> Vec<RankedAsset> {
    let mut ranked: Vec<RankedAsset> = rows
        .iter()
        .filter_map(|r| {
            key(r).map(|v| RankedAsset {
                asset: r.asset.clone(),
                value_pct: v,
            })
        })
        .collect();

    // Stable sort: ties keep snapshot order.
    ranked.sort_by(|a, b| {
        let ord = a.value_pct.partial_cmp(&b.value_pct).unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    ranked.truncate(top_n);
    ranked
}

pub fn rankings(snapshot: &DashboardSnapshot, top_n: usize) -> Rankings {
    Rankings {
        best_real_return_1y: rank_by(&snapshot.summary, top_n, |r| r.real_return_1y_pct, true),
        lowest_volatility: rank_by(&snapshot.summary, top_n, |r| r.volatility_pct, false),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub asset: String,
    pub signal: Signal,
    pub message: String,
}

pub fn alerts(snapshot: &DashboardSnapshot) -> Vec<Alert> {
    snapshot
        .signals
        .iter()
        .filter(|r| r.signal.is_actionable())
        .map(|r| {
            let ma = fmt_pct(r.dist_ma_1y_pct);
            let high = fmt_pct(r.dist_high_1y_pct);
            let message = match r.signal {
                Signal::Buy => format!(
                    "{}: BUY, {ma} vs 1y moving average and {high} vs 1y high",
                    r.asset
                ),
                _ => format!(
                    "{}: REDUCE, {ma} vs 1y moving average and {high} vs 1y high",
                    r.asset
                ),
            };
            Alert {
                asset: r.asset.clone(),
                signal: r.signal,
                message,
            }
        })
        .collect()
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:+.2}%"))
}

/// Current price against the 1-year moving average, the fair-value reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairValuePoint {
    pub asset: String,
    pub category: String,
    pub price: f64,
    pub fair_value: Option<f64>,
    pub gap_pct: Option<f64>,
}

/// The gap is the signal row's distance to the moving average, so both views
/// agree to the last decimal.
pub fn fair_value(snapshot: &DashboardSnapshot) -> Vec<FairValuePoint> {
    snapshot
        .summary
        .iter()
        .zip(&snapshot.signals)
        .map(|(r, s)| FairValuePoint {
            asset: r.asset.clone(),
            category: r.category.clone(),
            price: r.price,
            fair_value: r.ma_1y,
            gap_pct: s.dist_ma_1y_pct,
        })
        .collect()
}
