//! Domain Models
//!
//! Core data types for questionnaire-driven portfolio selection.
//! Statistics are `f64`; monetary amounts (see `profile`) use `rust_decimal`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{AdvisorError, Result};

/// Tolerance used when checking that weights sum to one
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Sector name used for instruments without a sector
pub const UNCLASSIFIED_SECTOR: &str = "Other";

/// Discretized investor risk tolerance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Map a questionnaire score to a level.
    ///
    /// Partition of the score domain:
    ///
    /// | score | level  |
    /// |-------|--------|
    /// | 3-4   | Low    |
    /// | 5-6   | Medium |
    /// | 7-9   | High   |
    ///
    /// Returns `None` outside 3..=9.
    pub fn from_score(score: u8) -> Option<Self> {
        match score {
            3..=4 => Some(Self::Low),
            5..=6 => Some(Self::Medium),
            7..=9 => Some(Self::High),
            _ => None,
        }
    }

    /// Reference portfolio offered by default at this level
    pub fn default_reference(self) -> ReferenceKind {
        match self {
            Self::Low => ReferenceKind::MinRisk,
            Self::Medium => ReferenceKind::BestRiskAdjusted,
            Self::High => ReferenceKind::MaxReturn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispersion measure used to rank candidate portfolios
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatModel {
    /// Standard deviation of returns
    #[default]
    Markowitz,
    /// Half the Gini mean difference of returns
    Gini,
}

impl StatModel {
    pub fn dispersion_label(self) -> &'static str {
        match self {
            Self::Markowitz => "Volatility",
            Self::Gini => "Gini",
        }
    }
}

impl fmt::Display for StatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markowitz => f.write_str("markowitz"),
            Self::Gini => f.write_str("gini"),
        }
    }
}

/// Answers to the algorithm preferences questionnaire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmPreferences {
    /// Whether the investor wants machine-learning forecasts downstream
    pub use_machine_learning: bool,

    /// Statistic model for portfolio selection
    pub model: StatModel,
}

impl Default for AlgorithmPreferences {
    fn default() -> Self {
        Self {
            use_machine_learning: false,
            model: StatModel::Markowitz,
        }
    }
}

impl AlgorithmPreferences {
    /// Build from the raw 0/1 form answers
    pub fn from_answers(ml_answer: i64, model_answer: i64) -> Result<Self> {
        let use_machine_learning = binary_answer("ml_answer", ml_answer)?;
        let model = if binary_answer("model_answer", model_answer)? {
            StatModel::Gini
        } else {
            StatModel::Markowitz
        };
        Ok(Self { use_machine_learning, model })
    }
}

fn binary_answer(field: &'static str, value: i64) -> Result<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(AdvisorError::InvalidPreference { field, value }),
    }
}

/// Wire shape of an instrument; converted through `Instrument::new`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<f64>,
}

/// A tradable instrument with its per-period return history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InstrumentRecord", into = "InstrumentRecord")]
pub struct Instrument {
    symbol: String,
    name: Option<String>,
    sector: Option<String>,
    dates: Vec<NaiveDate>,
    returns: Vec<f64>,
}

impl Instrument {
    /// Create an instrument from dated fractional returns (0.01 = +1%).
    pub fn new(symbol: impl Into<String>, dates: Vec<NaiveDate>, returns: Vec<f64>) -> Result<Self> {
        let symbol = symbol.into().trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AdvisorError::InvalidInstrument {
                symbol,
                reason: "symbol must be non-empty".into(),
            });
        }
        if dates.len() != returns.len() {
            return Err(AdvisorError::InvalidInstrument {
                symbol,
                reason: format!("{} dates for {} returns", dates.len(), returns.len()),
            });
        }
        if let Some(pos) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(AdvisorError::InvalidInstrument {
                symbol,
                reason: format!("dates not strictly increasing at {}", dates[pos + 1]),
            });
        }
        if let Some(index) = returns.iter().position(|r| !r.is_finite()) {
            return Err(AdvisorError::CorruptInstrumentData { symbol, index });
        }

        Ok(Self {
            symbol,
            name: None,
            sector: None,
            dates,
            returns,
        })
    }

    /// Create an instrument from dated closing prices.
    ///
    /// Returns are the period-over-period percentage change, dated at the
    /// later observation; the first price only anchors the series.
    pub fn from_prices(symbol: impl Into<String>, prices: &[(NaiveDate, f64)]) -> Result<Self> {
        let symbol = symbol.into();
        if prices.len() < 2 {
            return Err(AdvisorError::InsufficientHistory(format!(
                "{} needs at least 2 prices, got {}",
                symbol.trim().to_uppercase(),
                prices.len()
            )));
        }
        if let Some(index) = prices.iter().position(|(_, p)| !p.is_finite()) {
            return Err(AdvisorError::CorruptInstrumentData {
                symbol: symbol.trim().to_uppercase(),
                index,
            });
        }
        if let Some((date, price)) = prices.iter().find(|(_, p)| *p <= 0.0) {
            return Err(AdvisorError::InvalidInstrument {
                symbol: symbol.trim().to_uppercase(),
                reason: format!("non-positive price {price} on {date}"),
            });
        }

        let (dates, returns): (Vec<_>, Vec<_>) = prices
            .windows(2)
            .map(|w| (w[1].0, w[1].1 / w[0].1 - 1.0))
            .unzip();

        Self::new(symbol, dates, returns)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector.as_deref()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Number of observed periods
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Position of the first non-finite return, if any
    pub(crate) fn first_non_finite(&self) -> Option<usize> {
        self.returns.iter().position(|r| !r.is_finite())
    }

    /// Bypasses validation so selector checks can be exercised
    #[cfg(test)]
    pub(crate) fn from_raw_parts(symbol: &str, dates: Vec<NaiveDate>, returns: Vec<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: None,
            sector: None,
            dates,
            returns,
        }
    }
}

impl TryFrom<InstrumentRecord> for Instrument {
    type Error = AdvisorError;

    fn try_from(record: InstrumentRecord) -> Result<Self> {
        let mut instrument = Self::new(record.symbol, record.dates, record.returns)?;
        instrument.name = record.name;
        instrument.sector = record.sector;
        Ok(instrument)
    }
}

impl From<Instrument> for InstrumentRecord {
    fn from(instrument: Instrument) -> Self {
        Self {
            symbol: instrument.symbol,
            name: instrument.name,
            sector: instrument.sector,
            dates: instrument.dates,
            returns: instrument.returns,
        }
    }
}

/// Which of the three reference portfolios
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Lowest dispersion
    MinRisk,
    /// Highest Sharpe ratio
    BestRiskAdjusted,
    /// Highest annual return
    MaxReturn,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 3] = [Self::MinRisk, Self::BestRiskAdjusted, Self::MaxReturn];

    pub fn title(self) -> &'static str {
        match self {
            Self::MinRisk => "Safest Portfolio",
            Self::BestRiskAdjusted => "Sharpest Portfolio",
            Self::MaxReturn => "Max Returns Portfolio",
        }
    }
}

/// Summary statistics of a weighted portfolio, all annualized fractions
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub annual_return: f64,
    pub annual_volatility: f64,
    /// Equals `annual_volatility` under Markowitz, Gini dispersion under Gini
    pub annual_dispersion: f64,
    pub sharpe_ratio: f64,
    /// `annual_return - 1.65 * annual_dispersion`
    pub annual_max_loss: f64,
    /// Largest historical peak-to-trough fall, as a positive fraction
    pub max_drawdown: f64,
}

/// Weight of one instrument in a portfolio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub weight: f64,
}

/// A fully invested long-only portfolio over a fixed instrument set
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Holdings in universe order
    pub holdings: Vec<Holding>,
    pub stats: PortfolioStats,
}

impl Portfolio {
    pub fn weights(&self) -> Vec<f64> {
        self.holdings.iter().map(|h| h.weight).collect()
    }

    pub fn weight_sum(&self) -> f64 {
        self.holdings.iter().map(|h| h.weight).sum()
    }

    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.holdings
            .iter()
            .find(|h| h.symbol.eq_ignore_ascii_case(symbol))
            .map(|h| h.weight)
    }

    /// Check non-negative weights summing to one
    pub fn is_valid(&self) -> bool {
        self.holdings.iter().all(|h| h.weight >= 0.0 && h.weight.is_finite())
            && (self.weight_sum() - 1.0).abs() <= WEIGHT_TOLERANCE
    }

    /// Fold instrument weights into sector weights.
    ///
    /// Symbols missing from `sectors` are grouped under [`UNCLASSIFIED_SECTOR`].
    pub fn sector_weights(&self, sectors: &BTreeMap<String, String>) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for holding in &self.holdings {
            let sector = sectors
                .get(&holding.symbol)
                .map_or(UNCLASSIFIED_SECTOR, String::as_str);
            *out.entry(sector.to_string()).or_insert(0.0) += holding.weight;
        }
        out
    }

    /// Multi-line description in the style of the frontier report
    pub fn describe(&self, title: &str, model: StatModel) -> String {
        let s = &self.stats;
        let mut out = format!("{title}:\n");
        out.push_str(&format!("  Annual Returns:    {:.2}%\n", s.annual_return * 100.0));
        out.push_str(&format!(
            "  Annual {:<10}  {:.2}%\n",
            format!("{}:", model.dispersion_label()),
            s.annual_dispersion * 100.0
        ));
        out.push_str(&format!("  Annual Max Loss:   {:.2}%\n", s.annual_max_loss * 100.0));
        out.push_str(&format!("  Max Drawdown:      -{:.2}%\n", s.max_drawdown * 100.0));
        out.push_str(&format!("  Sharpe Ratio:      {:.2}\n", s.sharpe_ratio));
        for holding in &self.holdings {
            out.push_str(&format!("    {}({:.2}%)\n", holding.symbol, holding.weight * 100.0));
        }
        out
    }
}

/// The three portfolios picked from a sampled frontier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreeReferencePortfolios {
    pub risk_level: RiskLevel,
    pub model: StatModel,
    /// Number of candidates the selection was drawn from
    pub samples: usize,
    pub min_risk: Portfolio,
    pub best_risk_adjusted: Portfolio,
    pub max_return: Portfolio,
}

impl ThreeReferencePortfolios {
    pub fn get(&self, kind: ReferenceKind) -> &Portfolio {
        match kind {
            ReferenceKind::MinRisk => &self.min_risk,
            ReferenceKind::BestRiskAdjusted => &self.best_risk_adjusted,
            ReferenceKind::MaxReturn => &self.max_return,
        }
    }

    /// Portfolio offered by default for the recorded risk level
    pub fn recommended(&self) -> &Portfolio {
        self.get(self.risk_level.default_reference())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ReferenceKind, &Portfolio)> {
        ReferenceKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "Efficient Frontier ({} model, {} samples) - risk level: {}\n",
            self.model, self.samples, self.risk_level
        );
        s.push_str("═".repeat(50).as_str());
        s.push('\n');
        for (kind, portfolio) in self.iter() {
            let marker = if kind == self.risk_level.default_reference() {
                " (recommended)"
            } else {
                ""
            };
            s.push_str(&portfolio.describe(&format!("{}{marker}", kind.title()), self.model));
            s.push('\n');
        }
        s
    }
}
