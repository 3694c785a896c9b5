pub mod domain;
pub mod engine;
pub mod ingest;
pub mod pipeline;
pub mod storage;

pub mod config {
    use std::path::PathBuf;

    const DEFAULT_SNAPSHOT_DIR: &str = "data";
    const DEFAULT_DASHBOARD_FILE: &str = "dashboard.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub snapshot_dir: PathBuf,
        pub dashboard_file: String,
        pub sentry_dsn: Option<String>,
        pub price_source_base_url: Option<String>,
        pub inflation_source_base_url: Option<String>,
        pub inflation_series_id: Option<String>,
        pub universe_tickers: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let dashboard_file = std::env::var("DASHBOARD_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DASHBOARD_FILE.to_string());
            anyhow::ensure!(
                !dashboard_file.contains('/') && !dashboard_file.contains('\\'),
                "DASHBOARD_FILE must be a bare file name (got {dashboard_file})"
            );

            Ok(Self {
                snapshot_dir: std::env::var("SNAPSHOT_DIR")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
                dashboard_file,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                price_source_base_url: std::env::var("PRICE_SOURCE_BASE_URL").ok(),
                inflation_source_base_url: std::env::var("INFLATION_SOURCE_BASE_URL").ok(),
                inflation_series_id: std::env::var("INFLATION_SERIES_ID").ok(),
                universe_tickers: std::env::var("UNIVERSE_TICKERS")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            })
        }

        pub fn require_snapshot_dir(&self) -> anyhow::Result<&std::path::Path> {
            let dir = self.snapshot_dir.as_path();
            anyhow::ensure!(dir.exists(), "SNAPSHOT_DIR {} does not exist", dir.display());
            anyhow::ensure!(dir.is_dir(), "SNAPSHOT_DIR {} is not a directory", dir.display());
            Ok(dir)
        }
    }

    /// Optional numeric override. Unset or blank is `None`; anything that
    /// does not parse is an error rather than a silent default.
    pub fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow::anyhow!("{key} is invalid (got {s}): {e}")),
            _ => Ok(None),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn env_parse_rejects_malformed_values() {
            let key = "PRICEWATCH_TEST_ENV_PARSE";

            std::env::remove_var(key);
            assert_eq!(env_parse::<u64>(key).unwrap(), None);

            std::env::set_var(key, "  ");
            assert_eq!(env_parse::<u64>(key).unwrap(), None);

            std::env::set_var(key, " 45 ");
            assert_eq!(env_parse::<u64>(key).unwrap(), Some(45));

            std::env::set_var(key, "30s");
            let err = env_parse::<u64>(key).unwrap_err();
            assert!(err.to_string().contains(key));

            std::env::remove_var(key);
        }
    }
}
