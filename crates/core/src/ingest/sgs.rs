use crate::config::Settings;
use crate::ingest::source::{fetch_text_with_retries, InflationSource, SourceDiagnosticsError};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const SOURCE_NAME: &str = "bcb_sgs";
const DEFAULT_BASE_URL: &str = "https://api.bcb.gov.br";
/// IPCA, accumulated over 12 months (percent).
pub const DEFAULT_SERIES_ID: &str = "13522";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;

/// Banco Central do Brasil time-series (SGS) client.
#[derive(Debug, Clone)]
pub struct SgsClient {
    http: reqwest::Client,
    base_url: String,
    series_id: String,
    retries: u32,
}

impl SgsClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .inflation_source_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let series_id = settings
            .inflation_series_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERIES_ID.to_string());
        anyhow::ensure!(
            series_id.chars().all(|c| c.is_ascii_digit()),
            "INFLATION_SERIES_ID must be numeric (got {series_id})"
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build inflation source http client")?;

        Ok(Self {
            http,
            base_url,
            series_id,
            retries: DEFAULT_RETRIES,
        })
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    fn url(&self, series_id: &str) -> String {
        format!(
            "{}/dados/serie/bcdata.sgs.{}/dados/ultimos/1",
            self.base_url.trim_end_matches('/'),
            series_id
        )
    }
}

#[async_trait::async_trait]
impl InflationSource for SgsClient {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch_inflation_12m(&self, series_id: &str) -> Result<Option<f64>> {
        let url = self.url(series_id);
        tracing::debug!(%url, series_id, "fetching inflation reference");

        let (status, text) = fetch_text_with_retries(SOURCE_NAME, self.retries, || {
            self.http.get(&url).query(&[("formato", "json")])
        })
        .await?;

        if !status.is_success() {
            return Err(SourceDiagnosticsError {
                source: SOURCE_NAME,
                stage: "http",
                detail: format!("series={series_id} status={status}"),
                raw_body: Some(text),
            }
            .into());
        }

        parse_last_value(&text)
    }
}

#[derive(Debug, Deserialize)]
struct SgsObservation {
    valor: String,
}

/// Last observation of an SGS series, percent converted to a fraction.
fn parse_last_value(text: &str) -> Result<Option<f64>> {
    let rows = serde_json::from_str::<Vec<SgsObservation>>(text).map_err(|err| {
        SourceDiagnosticsError {
            source: SOURCE_NAME,
            stage: "parse",
            detail: err.to_string(),
            raw_body: Some(text.to_string()),
        }
    })?;

    let Some(last) = rows.last() else {
        return Ok(None);
    };

    let pct = last
        .valor
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .with_context(|| format!("SGS valor is not numeric: {}", last.valor))?;
    anyhow::ensure!(pct.is_finite(), "SGS valor is not finite: {}", last.valor);

    Ok(Some(pct / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_last_observation_as_fraction() {
        let body = json!([
            {"data": "01/08/2026", "valor": "5.13"},
            {"data": "01/09/2026", "valor": "4.56"}
        ])
        .to_string();
        let v = parse_last_value(&body).unwrap().unwrap();
        assert!((v - 0.0456).abs() < 1e-12);
    }

    #[test]
    fn accepts_decimal_comma() {
        let body = json!([{"data": "01/09/2026", "valor": "4,56"}]).to_string();
        let v = parse_last_value(&body).unwrap().unwrap();
        assert!((v - 0.0456).abs() < 1e-12);
    }

    #[test]
    fn empty_series_is_no_data() {
        assert_eq!(parse_last_value("[]").unwrap(), None);
    }

    #[test]
    fn rejects_non_numeric_values() {
        let body = json!([{"data": "01/09/2026", "valor": "n/d"}]).to_string();
        assert!(parse_last_value(&body).is_err());
        assert!(parse_last_value("{\"erro\": true}").is_err());
    }
}
