use crate::domain::series::PriceSeries;
use anyhow::{Context, Result};
use chrono::{DateTime, Months, NaiveDate, Utc};
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

/// How much history to request for a ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// The last `n` observations.
    TradingDays(usize),
    /// Everything within the last `n` calendar days.
    Days(u32),
    /// Everything within the last `n` years.
    Years(u32),
}

impl Lookback {
    /// First calendar date to request, relative to `now`.
    ///
    /// For `TradingDays` this over-fetches (weekends and holidays) and the
    /// caller trims to the last `n` observations.
    pub fn start_date(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        match *self {
            Lookback::TradingDays(n) => {
                let calendar = (n as i64) * 366 / 252 + 10;
                today - chrono::Duration::days(calendar)
            }
            Lookback::Days(n) => today - chrono::Duration::days(n as i64),
            Lookback::Years(n) => today
                .checked_sub_months(Months::new(n.saturating_mul(12)))
                .unwrap_or(NaiveDate::MIN),
        }
    }

    pub fn trim(&self, series: PriceSeries) -> Result<PriceSeries> {
        match *self {
            Lookback::TradingDays(n) if series.len() > n => {
                let keep = series.points()[series.len() - n..].to_vec();
                PriceSeries::try_new(keep)
            }
            _ => Ok(series),
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::TradingDays(n) => write!(f, "{n} trading days"),
            Lookback::Days(n) => write!(f, "{n}d"),
            Lookback::Years(n) => write!(f, "{n}y"),
        }
    }
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// `Ok(None)` means the provider has no data for the ticker.
    async fn fetch_series(&self, ticker: &str, lookback: Lookback) -> Result<Option<PriceSeries>>;
}

#[async_trait::async_trait]
pub trait InflationSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Trailing-12-month inflation as a fraction (0.0456 = 4.56%).
    async fn fetch_inflation_12m(&self, series_id: &str) -> Result<Option<f64>>;
}

#[derive(Debug, Clone)]
pub struct SourceDiagnosticsError {
    pub source: &'static str,
    pub stage: &'static str,
    pub detail: String,
    pub raw_body: Option<String>,
}

impl fmt::Display for SourceDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data source error (source={}, stage={}): {}",
            self.source, self.stage, self.detail
        )
    }
}

impl std::error::Error for SourceDiagnosticsError {}

/// Sends the request built by `build`, retrying transport errors, HTTP 429
/// and 5xx with exponential backoff. Any other status is returned as-is.
pub(crate) async fn fetch_text_with_retries<F>(
    source: &'static str,
    retries: u32,
    build: F,
) -> Result<(StatusCode, String)>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let max_attempts = retries.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;

        let res = match build().send().await {
            Ok(r) => r,
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err).with_context(|| format!("{source} request failed"));
                }
                let backoff = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(attempt, ?backoff, source, error = %err, "request failed; retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }
        };

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {source} response"))?;

        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if retryable && attempt < max_attempts {
            let backoff = Duration::from_secs(1 << (attempt - 1));
            tracing::warn!(attempt, ?backoff, source, http_status = %status, "HTTP error; retrying");
            tokio::time::sleep(backoff).await;
            continue;
        }

        return Ok((status, text));
    }
}
