use crate::config::{env_parse, Settings};
use crate::domain::series::{PricePoint, PriceSeries};
use crate::ingest::source::{fetch_text_with_retries, Lookback, PriceSource, SourceDiagnosticsError};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

const SOURCE_NAME: &str = "yahoo_chart";
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl YahooChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_source_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs =
            env_parse::<u64>("PRICE_SOURCE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = env_parse::<u32>("PRICE_SOURCE_RETRIES")?.unwrap_or(DEFAULT_RETRIES);
        anyhow::ensure!(retries >= 1, "PRICE_SOURCE_RETRIES must be >= 1");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build price source http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker.trim()
        )
    }

    async fn fetch_once(&self, ticker: &str, lookback: Lookback) -> Result<Option<PriceSeries>> {
        let now = Utc::now();
        let period1 = lookback
            .start_date(now)
            .and_hms_opt(0, 0, 0)
            .context("invalid lookback start")?
            .and_utc()
            .timestamp();
        let period2 = now.timestamp();

        let url = self.url(ticker);
        tracing::debug!(%url, %ticker, %lookback, "fetching price history");

        let query = [
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
            ("events", "div,splits".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        let (status, text) = fetch_text_with_retries(SOURCE_NAME, self.retries, || {
            self.http.get(&url).query(&query)
        })
        .await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(SourceDiagnosticsError {
                source: SOURCE_NAME,
                stage: "http",
                detail: format!("ticker={ticker} status={status}"),
                raw_body: Some(text),
            }
            .into());
        }

        let series = parse_chart_body(&text).with_context(|| format!("ticker={ticker}"))?;
        series.map(|s| lookback.trim(s)).transpose()
    }
}

#[async_trait::async_trait]
impl PriceSource for YahooChartClient {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_series(&self, ticker: &str, lookback: Lookback) -> Result<Option<PriceSeries>> {
        anyhow::ensure!(!ticker.trim().is_empty(), "ticker must be non-empty");
        self.fetch_once(ticker, lookback).await
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Adjusted closes keyed by exchange-local date. Null points are dropped;
/// `Ok(None)` when nothing usable remains.
fn parse_chart_body(text: &str) -> Result<Option<PriceSeries>> {
    let body = serde_json::from_str::<ChartResponse>(text).map_err(|err| SourceDiagnosticsError {
        source: SOURCE_NAME,
        stage: "parse",
        detail: err.to_string(),
        raw_body: Some(text.to_string()),
    })?;

    if let Some(err) = body.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Ok(None);
        }
        return Err(SourceDiagnosticsError {
            source: SOURCE_NAME,
            stage: "api",
            detail: format!("{}: {}", err.code, err.description),
            raw_body: None,
        }
        .into());
    }

    let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };

    // Prefer split/dividend adjusted closes; fall back to raw closes.
    let closes = match result.indicators.adjclose.into_iter().next() {
        Some(a) if !a.adjclose.is_empty() => a.adjclose,
        _ => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default(),
    };

    let offset = result.meta.gmtoffset;
    let mut points = Vec::with_capacity(result.timestamp.len());
    for (ts, close) in result.timestamp.iter().zip(closes) {
        let Some(close) = close else {
            continue;
        };
        let Some(local) = DateTime::from_timestamp(ts + offset, 0) else {
            continue;
        };
        points.push(PricePoint {
            date: local.date_naive(),
            close,
        });
    }

    points.retain(|p| p.close.is_finite() && p.close > 0.0);
    if points.is_empty() {
        return Ok(None);
    }

    PriceSeries::from_unsorted(points).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn parses_adjusted_closes_with_exchange_local_dates() {
        // 13:00 UTC on 2026-01-26/27/28; B3 is UTC-3.
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"symbol": "BOVA11.SA", "gmtoffset": -10800},
                    "timestamp": [1769432400, 1769518800, 1769605200],
                    "indicators": {
                        "quote": [{"close": [130.0, null, 131.0]}],
                        "adjclose": [{"adjclose": [129.5, null, 130.5]}]
                    }
                }],
                "error": null
            }
        })
        .to_string();

        let series = parse_chart_body(&body).unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![129.5, 130.5]);
        assert_eq!(series.first().date, NaiveDate::from_ymd_opt(2026, 1, 26).unwrap());
        assert_eq!(series.last().date, NaiveDate::from_ymd_opt(2026, 1, 28).unwrap());
    }

    #[test]
    fn falls_back_to_raw_close_without_adjclose() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": 0},
                    "timestamp": [1769432400, 1769518800],
                    "indicators": {"quote": [{"close": [10.0, 11.0]}]}
                }],
                "error": null
            }
        })
        .to_string();

        let series = parse_chart_body(&body).unwrap().unwrap();
        assert_eq!(series.closes(), vec![10.0, 11.0]);
    }

    #[test]
    fn not_found_and_empty_results_are_no_data() {
        let not_found = json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        })
        .to_string();
        assert!(parse_chart_body(&not_found).unwrap().is_none());

        let empty = json!({
            "chart": {
                "result": [{"meta": {}, "indicators": {"quote": [{}]}}],
                "error": null
            }
        })
        .to_string();
        assert!(parse_chart_body(&empty).unwrap().is_none());

        let all_null = json!({
            "chart": {
                "result": [{
                    "timestamp": [1769432400],
                    "indicators": {"quote": [{"close": [null]}]}
                }],
                "error": null
            }
        })
        .to_string();
        assert!(parse_chart_body(&all_null).unwrap().is_none());
    }

    #[test]
    fn other_api_errors_surface_with_diagnostics() {
        let body = json!({
            "chart": {
                "result": null,
                "error": {"code": "Bad Request", "description": "Invalid input"}
            }
        })
        .to_string();

        let err = parse_chart_body(&body).unwrap_err();
        let diag = err.downcast_ref::<SourceDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "api");
        assert!(diag.detail.contains("Invalid input"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_chart_body("<html>rate limited</html>").unwrap_err();
        let diag = err.downcast_ref::<SourceDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "parse");
    }

    use crate::ingest::stub_server::StubServer;

    fn client(base_url: &str, retries: u32) -> YahooChartClient {
        YahooChartClient {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            retries,
        }
    }

    fn chart_body() -> String {
        json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": -18000},
                    "timestamp": [1769432400, 1769518800],
                    "indicators": {"quote": [{"close": [500.0, 505.0]}]}
                }],
                "error": null
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn http_404_is_no_data_without_retry() {
        let server = StubServer::start(vec![(404, "{}".into())]).await;
        let series = client(&server.base_url, 3)
            .fetch_series("DEAD", Lookback::Days(500))
            .await
            .unwrap();
        assert!(series.is_none());
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn http_400_fails_with_diagnostics_without_retry() {
        let server = StubServer::start(vec![(400, "bad ticker".into())]).await;
        let err = client(&server.base_url, 3)
            .fetch_series("IVV", Lookback::Days(500))
            .await
            .unwrap_err();
        let diag = err.downcast_ref::<SourceDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, "http");
        assert_eq!(diag.raw_body.as_deref(), Some("bad ticker"));
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn transient_503_then_chart_is_parsed() {
        let server = StubServer::start(vec![(503, String::new()), (200, chart_body())]).await;
        let series = client(&server.base_url, 3)
            .fetch_series("IVV", Lookback::Days(500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(series.closes(), vec![500.0, 505.0]);
        assert_eq!(server.hits(), 2);

        let line = &server.request_lines()[1];
        assert!(line.starts_with("GET /v8/finance/chart/IVV?"));
        assert!(line.contains("interval=1d"));
        assert!(line.contains("events=div%2Csplits"));
        assert!(line.contains("includeAdjustedClose=true"));
    }

    #[tokio::test]
    async fn persistent_429_fails_after_all_attempts() {
        let server = StubServer::start(vec![(429, "Too Many Requests".into())]).await;
        let err = client(&server.base_url, 2)
            .fetch_series("IVV", Lookback::Days(500))
            .await
            .unwrap_err();
        let diag = err.downcast_ref::<SourceDiagnosticsError>().unwrap();
        assert!(diag.detail.contains("429"));
        assert_eq!(server.hits(), 2);
    }
}
