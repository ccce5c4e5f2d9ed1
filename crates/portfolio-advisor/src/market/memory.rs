//! In-Memory Market Data
//!
//! Serves instruments from memory: loaded from a JSON dump, handed in by the
//! caller, or generated as a deterministic demo data set.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{InstrumentsResponse, MarketData};
use crate::error::{AdvisorError, Result};
use crate::model::Instrument;

/// Demo universe: (symbol, name, sector, daily drift, daily volatility)
pub const DEMO_UNIVERSE: &[(&str, &str, &str, f64, f64)] = &[
    ("SPY", "S&P 500 ETF", "Equity", 0.0004, 0.011),
    ("QQQ", "Nasdaq 100 ETF", "Technology", 0.0006, 0.015),
    ("TLT", "20+ Year Treasury ETF", "Bonds", 0.0001, 0.008),
    ("GLD", "Gold ETF", "Commodities", 0.0002, 0.009),
    ("XLE", "Energy Select ETF", "Energy", 0.0003, 0.018),
    ("VNQ", "Real Estate ETF", "Real Estate", 0.0002, 0.013),
];

/// Symbols of the demo universe, in table order
pub fn demo_symbols() -> Vec<String> {
    DEMO_UNIVERSE.iter().map(|(s, ..)| (*s).to_string()).collect()
}

/// Market data held in memory
#[derive(Clone, Debug, Default)]
pub struct InMemoryMarketData {
    instruments: HashMap<String, Instrument>,
}

impl InMemoryMarketData {
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut data = Self::default();
        for instrument in instruments {
            data.insert(instrument);
        }
        data
    }

    /// Add or replace an instrument
    pub fn insert(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.symbol().to_string(), instrument);
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Load a JSON dump, either `{"instruments": [...]}` or a bare array.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let data = Self::from_json_str(&text)?;
        tracing::info!(path = %path.display(), instruments = data.len(), "loaded market data file");
        Ok(data)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let instruments = if value.is_array() {
            serde_json::from_value::<Vec<Instrument>>(value)?
        } else {
            serde_json::from_value::<InstrumentsResponse>(value)?.instruments
        };
        Ok(Self::new(instruments))
    }

    /// Deterministic synthetic business-day history for [`DEMO_UNIVERSE`].
    pub fn demo(seed: u64, periods: usize) -> Result<Self> {
        let dates = business_days(NaiveDate::from_ymd_opt(2021, 1, 4).unwrap_or_default(), periods);
        let mut rng = StdRng::seed_from_u64(seed);
        // shared market factor so the demo assets are correlated
        let market: Vec<f64> = (0..periods).map(|_| rng.random::<f64>() - 0.5).collect();

        let mut data = Self::default();
        for (symbol, name, sector, drift, vol) in DEMO_UNIVERSE {
            let returns = market
                .iter()
                .map(|m| {
                    let own = rng.random::<f64>() - 0.5;
                    // uniform(-0.5, 0.5) has std 1/sqrt(12)
                    drift + vol * 12f64.sqrt() * (0.6 * m + 0.8 * own)
                })
                .collect();
            let instrument = Instrument::new(*symbol, dates.clone(), returns)?
                .with_name(*name)
                .with_sector(*sector);
            data.insert(instrument);
        }
        Ok(data)
    }
}

fn business_days(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let mut day = start;
    while out.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day += Duration::days(1);
    }
    out
}

#[async_trait]
impl MarketData for InMemoryMarketData {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        self.instruments
            .get(&symbol.trim().to_uppercase())
            .cloned()
            .ok_or_else(|| AdvisorError::UnknownInstrument(symbol.to_string()))
    }

    async fn health_check(&self) -> bool {
        !self.instruments.is_empty()
    }

    fn name(&self) -> &str {
        "InMemory"
    }
}
