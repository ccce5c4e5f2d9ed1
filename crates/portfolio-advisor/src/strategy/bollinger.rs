//! Bollinger Band Strategy
//!
//! Rolling mean ± k·std bands over a price path, with a squeeze-style signal:
//! buy when the price crosses below the lower band, sell when it crosses above
//! the upper band, never repeating the previous signal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::Instrument;
use crate::strategy::stats::{mean, sample_std};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BollingerConfig {
    /// Rolling window in periods
    pub window: usize,

    /// Band width in standard deviations
    pub num_std: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            num_std: 2.0,
        }
    }
}

impl BollingerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window < 2 {
            return Err(AdvisorError::InvalidParameter(format!(
                "bollinger window must be at least 2, got {}",
                self.window
            )));
        }
        if !(self.num_std.is_finite() && self.num_std > 0.0) {
            return Err(AdvisorError::InvalidParameter(format!(
                "bollinger width must be positive, got {}",
                self.num_std
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub index: usize,
    pub date: NaiveDate,
    pub side: SignalSide,
    pub price: f64,
}

/// Bands and signals; band entries are `None` until the window fills
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub symbol: String,
    pub config: BollingerConfig,
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<f64>,
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub signals: Vec<Signal>,
}

impl BollingerBands {
    /// Bands over dated prices
    pub fn from_prices(
        symbol: impl Into<String>,
        dates: Vec<NaiveDate>,
        prices: Vec<f64>,
        config: BollingerConfig,
    ) -> Result<Self> {
        let symbol = symbol.into();
        config.validate()?;
        if dates.len() != prices.len() {
            return Err(AdvisorError::InvalidParameter(format!(
                "{} dates for {} prices",
                dates.len(),
                prices.len()
            )));
        }
        if let Some(index) = prices.iter().position(|p| !p.is_finite()) {
            return Err(AdvisorError::CorruptInstrumentData { symbol, index });
        }
        if prices.len() < config.window {
            return Err(AdvisorError::InsufficientHistory(format!(
                "{symbol} has {} periods, bollinger window needs {}",
                prices.len(),
                config.window
            )));
        }

        let n = prices.len();
        let mut middle = vec![None; n];
        let mut upper = vec![None; n];
        let mut lower = vec![None; n];
        for end in config.window..=n {
            let slice = &prices[end - config.window..end];
            let m = mean(slice);
            let width = config.num_std * sample_std(slice);
            middle[end - 1] = Some(m);
            upper[end - 1] = Some(m + width);
            lower[end - 1] = Some(m - width);
        }

        let signals = crossings(&dates, &prices, &upper, &lower);
        Ok(Self {
            symbol,
            config,
            dates,
            prices,
            middle,
            upper,
            lower,
            signals,
        })
    }

    /// Bands over the growth of 1 invested before the first return
    pub fn from_returns(
        symbol: impl Into<String>,
        dates: &[NaiveDate],
        returns: &[f64],
        config: BollingerConfig,
    ) -> Result<Self> {
        let prices = returns
            .iter()
            .scan(1.0_f64, |wealth, r| {
                *wealth *= 1.0 + r;
                Some(*wealth)
            })
            .collect();
        Self::from_prices(symbol, dates.to_vec(), prices, config)
    }

    pub fn for_instrument(instrument: &Instrument, config: BollingerConfig) -> Result<Self> {
        Self::from_returns(instrument.symbol(), instrument.dates(), instrument.returns(), config)
    }

    pub fn buy_count(&self) -> usize {
        self.count(SignalSide::Buy)
    }

    pub fn sell_count(&self) -> usize {
        self.count(SignalSide::Sell)
    }

    fn count(&self, side: SignalSide) -> usize {
        self.signals.iter().filter(|s| s.side == side).count()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Bollinger Bands Squeeze Strategy - {} ({} periods, window {}, ±{}σ)\n",
            self.symbol,
            self.prices.len(),
            self.config.window,
            self.config.num_std
        );
        out.push_str(&format!("  Buy signals:  {}\n", self.buy_count()));
        out.push_str(&format!("  Sell signals: {}\n", self.sell_count()));
        for signal in &self.signals {
            let side = match signal.side {
                SignalSide::Buy => "BUY ",
                SignalSide::Sell => "SELL",
            };
            out.push_str(&format!("    {} {side} at {:.4}\n", signal.date, signal.price));
        }
        out
    }
}

fn crossings(
    dates: &[NaiveDate],
    prices: &[f64],
    upper: &[Option<f64>],
    lower: &[Option<f64>],
) -> Vec<Signal> {
    let mut signals = Vec::new();
    let mut last: Option<SignalSide> = None;
    for i in 1..prices.len() {
        let (Some(lo_prev), Some(lo), Some(up_prev), Some(up)) = (lower[i - 1], lower[i], upper[i - 1], upper[i]) else {
            continue;
        };
        let side = if prices[i - 1] > lo_prev && prices[i] < lo {
            SignalSide::Buy
        } else if prices[i - 1] < up_prev && prices[i] > up {
            SignalSide::Sell
        } else {
            continue;
        };
        if last != Some(side) {
            signals.push(Signal {
                index: i,
                date: dates[i],
                side,
                price: prices[i],
            });
            last = Some(side);
        }
    }
    signals
}
