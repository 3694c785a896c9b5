//! Return and risk metrics over a slice of adjusted closes.
//!
//! Every function is total: a window that is too short, or a result that is
//! not finite, comes back as `None` instead of NaN.

pub const TRADING_DAYS_PER_YEAR: usize = 252;

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// CAGR-style return over the last `horizon` observations:
/// `(last/first)^(annualization/n) - 1` with `n` the observation count.
///
/// `None` when the series is shorter than the horizon or the window holds
/// fewer than two observations.
pub fn annualized_return(closes: &[f64], horizon: usize, annualization: usize) -> Option<f64> {
    if horizon < 2 || closes.len() < horizon {
        return None;
    }

    let window = &closes[closes.len() - horizon..];
    let first = *window.first()?;
    let last = *window.last()?;
    if first <= 0.0 {
        return None;
    }

    let n = window.len() as f64;
    finite((last / first).powf(annualization as f64 / n) - 1.0)
}

/// Fisher adjustment: `(1 + nominal) / (1 + inflation) - 1`.
pub fn real_return(nominal: Option<f64>, inflation: Option<f64>) -> Option<f64> {
    let nominal = nominal?;
    let inflation = inflation?;
    if 1.0 + inflation == 0.0 {
        return None;
    }
    finite((1.0 + nominal) / (1.0 + inflation) - 1.0)
}

pub fn daily_changes(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Sample (n-1) standard deviation of simple daily changes, annualized by
/// `sqrt(annualization)`.
pub fn volatility(closes: &[f64], annualization: usize) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }

    let changes = daily_changes(closes);
    // A sample deviation needs at least two changes.
    if changes.len() < 2 {
        return None;
    }

    let n = changes.len() as f64;
    let mean = changes.iter().sum::<f64>() / n;
    let var = changes.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

    finite(var.sqrt() * (annualization as f64).sqrt())
}

/// Most negative `P_t / max(P_0..P_t) - 1` over the series.
pub fn max_drawdown(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;

    let mut peak = first;
    let mut worst = 0.0_f64;
    for &p in closes {
        if p > peak {
            peak = p;
        }
        let dd = p / peak - 1.0;
        if dd < worst {
            worst = dd;
        }
    }

    finite(worst)
}

/// Mean of the last `window` observations; never computed on a partial window.
pub fn moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    finite(tail.iter().sum::<f64>() / window as f64)
}

/// Highest close over the last `window` observations; never computed on a partial window.
pub fn trailing_high(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    closes[closes.len() - window..]
        .iter()
        .copied()
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |m| m.max(p))))
}

/// `price / reference - 1`.
pub fn distance(price: f64, reference: Option<f64>) -> Option<f64> {
    let reference = reference.filter(|r| *r > 0.0)?;
    finite(price / reference - 1.0)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fraction to percent, rounded to two decimals.
pub fn to_pct(v: Option<f64>) -> Option<f64> {
    v.map(|x| round2(x * 100.0))
}
