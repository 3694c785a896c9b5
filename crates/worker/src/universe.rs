use clap::ValueEnum;
use pricewatch_core::domain::asset::Asset;
use pricewatch_core::ingest::source::Lookback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UniversePreset {
    /// B3-listed ETFs, six years of history, real returns against IPCA.
    BrEtfs,
    /// US-listed ETFs, 500 days of history, nominal returns only.
    UsEtfs,
}

#[derive(Debug, Clone)]
pub struct Universe {
    pub preset: UniversePreset,
    pub assets: Vec<Asset>,
    pub lookback: Lookback,
    pub use_inflation: bool,
}

const BR_ETFS: [(&str, &str); 4] = [
    ("BOVA11", "BOVA11.SA"),
    ("IVVB11", "IVVB11.SA"),
    ("GOLD11", "GOLD11.SA"),
    ("BIXN39", "BIXN39.SA"),
];

const US_ETFS: [&str; 7] = ["IVV", "VUG", "QQQ", "SCHD", "XLK", "IYW", "MAGS"];

impl UniversePreset {
    fn category(self) -> &'static str {
        match self {
            UniversePreset::BrEtfs => "br_etf",
            UniversePreset::UsEtfs => "us_etf",
        }
    }

    pub fn build(self) -> Universe {
        let category = self.category();
        match self {
            UniversePreset::BrEtfs => Universe {
                preset: self,
                assets: BR_ETFS
                    .iter()
                    .map(|(symbol, ticker)| Asset::new(*symbol, *ticker, category))
                    .collect(),
                lookback: Lookback::Years(6),
                use_inflation: true,
            },
            UniversePreset::UsEtfs => Universe {
                preset: self,
                assets: US_ETFS
                    .iter()
                    .map(|t| Asset::new(*t, *t, category))
                    .collect(),
                lookback: Lookback::Days(500),
                use_inflation: false,
            },
        }
    }
}

/// One universe per distinct preset, in the order given. A ticker override
/// replaces the asset list and so applies to a single preset only.
pub fn resolve_universes(
    presets: &[UniversePreset],
    tickers: Option<&str>,
) -> anyhow::Result<Vec<Universe>> {
    let mut distinct: Vec<UniversePreset> = Vec::new();
    for p in presets {
        if !distinct.contains(p) {
            distinct.push(*p);
        }
    }
    anyhow::ensure!(!distinct.is_empty(), "no universe selected");
    anyhow::ensure!(
        tickers.is_none() || distinct.len() == 1,
        "a ticker override needs exactly one --universe"
    );

    distinct
        .into_iter()
        .map(|preset| resolve_universe(preset, tickers))
        .collect()
}

/// Preset universe, optionally with its ticker list replaced by a
/// comma-separated override. Lookback and inflation policy stay the preset's.
pub fn resolve_universe(preset: UniversePreset, tickers: Option<&str>) -> anyhow::Result<Universe> {
    let mut universe = preset.build();

    if let Some(list) = tickers {
        universe.assets = parse_tickers(list, preset.category())?;
    }

    anyhow::ensure!(!universe.assets.is_empty(), "asset universe is empty");
    Ok(universe)
}

fn parse_tickers(list: &str, category: &str) -> anyhow::Result<Vec<Asset>> {
    let mut out = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let asset = Asset::from_ticker(part, category)?;
        asset.validate()?;
        out.push(asset);
    }
    Ok(out)
}
