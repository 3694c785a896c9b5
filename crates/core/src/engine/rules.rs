use crate::domain::signal::Signal;

/// Distance thresholds, as fractions (−0.10 = −10%).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub buy_below_ma: f64,
    pub buy_below_high: f64,
    pub reduce_above_ma: f64,
    pub reduce_above_high: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            buy_below_ma: -0.10,
            buy_below_high: -0.20,
            reduce_above_ma: 0.20,
            reduce_above_high: -0.05,
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, v) in [
            ("buy_below_ma", self.buy_below_ma),
            ("buy_below_high", self.buy_below_high),
            ("reduce_above_ma", self.reduce_above_ma),
            ("reduce_above_high", self.reduce_above_high),
        ] {
            anyhow::ensure!(v.is_finite(), "threshold {name} must be finite (got {v})");
        }
        anyhow::ensure!(
            self.buy_below_ma < self.reduce_above_ma,
            "buy_below_ma must be below reduce_above_ma"
        );
        anyhow::ensure!(
            self.buy_below_high < self.reduce_above_high,
            "buy_below_high must be below reduce_above_high"
        );
        Ok(())
    }
}

/// First match wins: BUY, then REDUCE, then NEUTRAL.
///
/// Either distance missing means there was not enough history for a full
/// 1-year window; that is always NEUTRAL.
pub fn derive_signal(
    dist_ma: Option<f64>,
    dist_high: Option<f64>,
    thresholds: &SignalThresholds,
) -> Signal {
    let (Some(dist_ma), Some(dist_high)) = (dist_ma, dist_high) else {
        return Signal::Neutral;
    };

    if dist_ma < thresholds.buy_below_ma && dist_high < thresholds.buy_below_high {
        Signal::Buy
    } else if dist_ma > thresholds.reduce_above_ma || dist_high > thresholds.reduce_above_high {
        Signal::Reduce
    } else {
        Signal::Neutral
    }
}
