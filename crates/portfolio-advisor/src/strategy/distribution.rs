//! Monthly return distribution of a period series.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::{Instrument, ReferenceKind, StatModel, ThreeReferencePortfolios};
use crate::strategy::stats::{mean, portfolio_series, sample_std};

/// Month-over-month changes of the compounded path.
///
/// Each calendar month is sampled at its first period, then consecutive
/// samples are compared. Fewer than two months yields an empty list.
pub fn monthly_changes(dates: &[NaiveDate], series: &[f64]) -> Vec<f64> {
    let mut firsts: Vec<f64> = Vec::new();
    let mut current: Option<(i32, u32)> = None;
    let mut wealth = 1.0_f64;
    for (date, r) in dates.iter().zip(series) {
        wealth *= 1.0 + r;
        let month = (date.year(), date.month());
        if current != Some(month) {
            current = Some(month);
            firsts.push(wealth);
        }
    }
    firsts.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Descriptive statistics of a sample, quantiles linearly interpolated
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnDistribution {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ReturnDistribution {
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            count: values.len(),
            mean: mean(values),
            std: sample_std(values),
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }

    /// One report line, values in percent
    pub fn line(&self, label: &str) -> String {
        format!(
            "{label:<12} mean {:>6.2}%  std {:>6.2}%  min {:>7.2}%  25% {:>6.2}%  50% {:>6.2}%  75% {:>6.2}%  max {:>6.2}%",
            self.mean * 100.0,
            self.std * 100.0,
            self.min * 100.0,
            self.q25 * 100.0,
            self.median * 100.0,
            self.q75 * 100.0,
            self.max * 100.0
        )
    }
}

/// Monthly return distributions of the three reference portfolios
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierDistributions {
    pub model: StatModel,
    pub entries: Vec<(ReferenceKind, ReturnDistribution)>,
}

impl FrontierDistributions {
    /// `instruments` must be the universe `references` was selected from.
    pub fn from_references(references: &ThreeReferencePortfolios, instruments: &[Instrument]) -> Result<Self> {
        let dates = instruments.first().map(Instrument::dates).unwrap_or_default();
        let columns: Vec<&[f64]> = instruments.iter().map(Instrument::returns).collect();

        let entries = references
            .iter()
            .map(|(kind, portfolio)| {
                let aligned = portfolio.holdings.len() == instruments.len()
                    && portfolio
                        .holdings
                        .iter()
                        .zip(instruments)
                        .all(|(h, i)| h.symbol == i.symbol());
                if !aligned {
                    return Err(AdvisorError::InvalidWeights(
                        "portfolio holdings do not match the instrument universe".into(),
                    ));
                }
                let series = portfolio_series(&columns, &portfolio.weights());
                ReturnDistribution::describe(&monthly_changes(dates, &series))
                    .map(|dist| (kind, dist))
                    .ok_or_else(|| {
                        AdvisorError::InsufficientHistory("monthly distribution needs at least two calendar months".into())
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            model: references.model,
            entries,
        })
    }

    pub fn summary(&self) -> String {
        let mut out = format!("Distribution of Portfolios - By Monthly Returns ({} model)\n", self.model);
        for (kind, dist) in &self.entries {
            let label = match kind {
                ReferenceKind::MinRisk => "Low Risk",
                ReferenceKind::BestRiskAdjusted => "Medium Risk",
                ReferenceKind::MaxReturn => "High Risk",
            };
            out.push_str(&dist.line(label));
            out.push('\n');
        }
        out
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
