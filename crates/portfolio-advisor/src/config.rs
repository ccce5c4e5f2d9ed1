//! Advisor Settings
//!
//! Everything the advisor needs is read once from the environment into
//! explicit values and passed down; nothing below reads the environment.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AdvisorError, Result};
use crate::market::{demo_symbols, DEMO_UNIVERSE};
use crate::strategy::{BollingerConfig, SelectorConfig};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_PATH: &str = "/v1/instruments";
const DEFAULT_RANKING_TOP: usize = 3;

/// Where instrument histories come from
#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataSettings {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub path: String,
    pub timeout_secs: u64,
    pub retries: u32,
    /// JSON dump used when no base URL is configured
    pub file: Option<PathBuf>,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            path: DEFAULT_PATH.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorSettings {
    /// Instrument universe, in report order
    pub symbols: Vec<String>,

    /// Symbol -> sector name
    pub sectors: BTreeMap<String, String>,

    pub selector: SelectorConfig,

    pub bollinger: BollingerConfig,

    /// Entries per list in the instrument ranking
    pub ranking_top: usize,

    pub market_data: MarketDataSettings,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            symbols: demo_symbols(),
            sectors: DEMO_UNIVERSE
                .iter()
                .map(|(symbol, _, sector, ..)| ((*symbol).to_string(), (*sector).to_string()))
                .collect(),
            selector: SelectorConfig::default(),
            bollinger: BollingerConfig::default(),
            ranking_top: DEFAULT_RANKING_TOP,
            market_data: MarketDataSettings::default(),
        }
    }
}

impl AdvisorSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Self::default();

        if let Some(raw) = get("ADVISOR_SYMBOLS") {
            settings.symbols = parse_symbols(&raw);
            if settings.symbols.is_empty() {
                return Err(AdvisorError::Config("ADVISOR_SYMBOLS lists no symbols".into()));
            }
        }
        if let Some(raw) = get("ADVISOR_SECTORS") {
            settings.sectors = parse_sectors(&raw)?;
        }

        let selector = &mut settings.selector;
        if let Some(raw) = get("ADVISOR_NUM_SAMPLES") {
            selector.num_samples = parse("ADVISOR_NUM_SAMPLES", &raw)?;
        }
        if let Some(raw) = get("ADVISOR_SEED") {
            selector.seed = parse("ADVISOR_SEED", &raw)?;
        }
        if let Some(raw) = get("ADVISOR_PERIODS_PER_YEAR") {
            selector.periods_per_year = parse("ADVISOR_PERIODS_PER_YEAR", &raw)?;
        }
        if let Some(raw) = get("ADVISOR_RISK_FREE_RATE") {
            selector.risk_free_rate = parse("ADVISOR_RISK_FREE_RATE", &raw)?;
        }
        if let Some(raw) = get("ADVISOR_MIN_INSTRUMENTS") {
            selector.min_instruments = parse("ADVISOR_MIN_INSTRUMENTS", &raw)?;
        }
        if selector.num_samples == 0 {
            return Err(AdvisorError::Config("ADVISOR_NUM_SAMPLES must be at least 1".into()));
        }
        if !(selector.periods_per_year.is_finite() && selector.periods_per_year > 0.0) {
            return Err(AdvisorError::Config("ADVISOR_PERIODS_PER_YEAR must be positive".into()));
        }

        if let Some(raw) = get("ADVISOR_BB_WINDOW") {
            settings.bollinger.window = parse("ADVISOR_BB_WINDOW", &raw)?;
        }
        if let Some(raw) = get("ADVISOR_BB_STD") {
            settings.bollinger.num_std = parse("ADVISOR_BB_STD", &raw)?;
        }
        settings
            .bollinger
            .validate()
            .map_err(|e| AdvisorError::Config(e.to_string()))?;
        if let Some(raw) = get("ADVISOR_RANKING_TOP") {
            settings.ranking_top = parse("ADVISOR_RANKING_TOP", &raw)?;
        }
        if settings.ranking_top == 0 {
            return Err(AdvisorError::Config("ADVISOR_RANKING_TOP must be at least 1".into()));
        }

        let market = &mut settings.market_data;
        market.base_url = get("MARKET_DATA_BASE_URL");
        market.api_key = get("MARKET_DATA_API_KEY");
        market.file = get("MARKET_DATA_FILE").map(PathBuf::from);
        if let Some(path) = get("MARKET_DATA_PATH") {
            market.path = path;
        }
        if let Some(raw) = get("MARKET_DATA_TIMEOUT_SECS") {
            market.timeout_secs = parse("MARKET_DATA_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("MARKET_DATA_RETRIES") {
            market.retries = parse("MARKET_DATA_RETRIES", &raw)?;
        }

        Ok(settings)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| AdvisorError::Config(format!("{key}={raw}: {e}")))
}

fn parse_symbols(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()) {
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

/// `AAPL=Technology,XOM=Energy`
fn parse_sectors(raw: &str) -> Result<BTreeMap<String, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, String)> {
            let (symbol, sector) = pair
                .split_once('=')
                .ok_or_else(|| AdvisorError::Config(format!("ADVISOR_SECTORS entry '{pair}' is not SYMBOL=Sector")))?;
            Ok((symbol.trim().to_uppercase(), sector.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = AdvisorSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, AdvisorSettings::default());
        assert_eq!(settings.symbols.len(), DEMO_UNIVERSE.len());
        assert_eq!(settings.sectors.get("TLT").map(String::as_str), Some("Bonds"));
    }

    #[test]
    fn test_overrides() {
        let settings = AdvisorSettings::from_lookup(lookup(&[
            ("ADVISOR_SYMBOLS", "aapl, msft,,AAPL"),
            ("ADVISOR_SECTORS", "AAPL=Technology, msft = Technology"),
            ("ADVISOR_NUM_SAMPLES", "500"),
            ("ADVISOR_SEED", "9"),
            ("ADVISOR_RISK_FREE_RATE", "0.02"),
            ("MARKET_DATA_BASE_URL", "https://data.example.com"),
            ("MARKET_DATA_RETRIES", "5"),
            ("ADVISOR_BB_WINDOW", "10"),
            ("ADVISOR_BB_STD", "1.5"),
            ("ADVISOR_RANKING_TOP", "2"),
        ]))
        .unwrap();

        assert_eq!(settings.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(settings.sectors["MSFT"], "Technology");
        assert_eq!(settings.selector.num_samples, 500);
        assert_eq!(settings.selector.seed, 9);
        assert!((settings.selector.risk_free_rate - 0.02).abs() < 1e-12);
        assert_eq!(settings.market_data.base_url.as_deref(), Some("https://data.example.com"));
        assert_eq!(settings.market_data.retries, 5);
        assert_eq!(settings.bollinger.window, 10);
        assert!((settings.bollinger.num_std - 1.5).abs() < 1e-12);
        assert_eq!(settings.ranking_top, 2);
    }

    #[test]
    fn test_malformed_values() {
        for pairs in [
            [("ADVISOR_NUM_SAMPLES", "many")],
            [("ADVISOR_NUM_SAMPLES", "0")],
            [("ADVISOR_PERIODS_PER_YEAR", "-1")],
            [("ADVISOR_SECTORS", "AAPL")],
            [("ADVISOR_SYMBOLS", ", ,")],
            [("ADVISOR_BB_WINDOW", "1")],
            [("ADVISOR_BB_STD", "0")],
            [("ADVISOR_RANKING_TOP", "0")],
        ] {
            let err = AdvisorSettings::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, AdvisorError::Config(_)), "{pairs:?}");
        }
    }
}
