use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Display name used in outputs and history file names (e.g. "BOVA11").
    pub symbol: String,
    /// Provider symbol (e.g. "BOVA11.SA").
    pub ticker: String,
    pub category: String,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, ticker: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ticker: ticker.into(),
            category: category.into(),
        }
    }

    /// Asset whose display symbol is the provider ticker minus any exchange suffix.
    pub fn from_ticker(ticker: &str, category: &str) -> anyhow::Result<Self> {
        let ticker = ticker.trim();
        anyhow::ensure!(!ticker.is_empty(), "ticker must be non-empty");

        let symbol = ticker.split('.').next().unwrap_or(ticker).to_ascii_uppercase();
        Ok(Self::new(symbol, ticker.to_ascii_uppercase(), category))
    }

    /// Name is used for `{symbol}_history.json`, so it must stay a single path segment.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.symbol.trim().is_empty(), "symbol must be non-empty");
        anyhow::ensure!(!self.ticker.trim().is_empty(), "ticker must be non-empty");
        anyhow::ensure!(
            self.symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '^' | '=')),
            "symbol contains characters not allowed in a file name: {}",
            self.symbol
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_exchange_suffix_for_symbol() {
        let a = Asset::from_ticker("bova11.sa", "br_etf").unwrap();
        assert_eq!(a.symbol, "BOVA11");
        assert_eq!(a.ticker, "BOVA11.SA");
        assert_eq!(a.category, "br_etf");
        assert!(a.validate().is_ok());
    }

    #[test]
    fn rejects_path_like_symbols() {
        let a = Asset::new("../etc", "X", "custom");
        assert!(a.validate().is_err());
        assert!(Asset::from_ticker("  ", "custom").is_err());
    }
}
