//! Investor Profile
//!
//! The record handed to the persistence layer once a questionnaire has been
//! scored and the reference portfolios computed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::{
    AlgorithmPreferences, Instrument, PortfolioStats, ReferenceKind, RiskLevel,
    ThreeReferencePortfolios, UNCLASSIFIED_SECTOR,
};
use crate::strategy::RiskAssessment;
use crate::strategy::stats::{compounded_change, portfolio_series};

/// Periods treated as one month of daily data
pub const MONTH_PERIODS: usize = 21;

/// One line of the investor's allocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoldingAllocation {
    pub symbol: String,
    pub sector: String,
    pub weight: f64,
    /// Amount in account currency, rounded to cents
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestorProfile {
    /// External account identifier
    pub user_id: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub preferences: AlgorithmPreferences,
    /// Which reference portfolio the profile holds
    pub reference: ReferenceKind,
    pub starting_investment_amount: Decimal,
    pub allocations: Vec<HoldingAllocation>,
    pub sector_weights: BTreeMap<String, f64>,
    pub stats: PortfolioStats,
    /// Compounded change over the whole history
    pub total_change: f64,
    /// Compounded change over the last [`MONTH_PERIODS`] periods
    pub monthly_change: f64,
    /// Change of the last period
    pub daily_change: f64,
    pub created_at: DateTime<Utc>,
}

impl InvestorProfile {
    /// Build a profile around the risk level's default reference portfolio.
    ///
    /// `instruments` must be the universe `references` was selected from.
    /// Sectors come from the instrument when it has one, then from `sectors`.
    /// `amount` must be non-negative and in whole cents.
    pub fn build(
        user_id: impl Into<String>,
        assessment: &RiskAssessment,
        preferences: AlgorithmPreferences,
        amount: Decimal,
        references: &ThreeReferencePortfolios,
        instruments: &[Instrument],
        sectors: &BTreeMap<String, String>,
    ) -> Result<Self> {
        if amount < Decimal::ZERO || amount != amount.round_dp(2) {
            return Err(AdvisorError::InvalidAmount(amount));
        }

        let reference = assessment.level.default_reference();
        let portfolio = references.get(reference);

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

        let sector_map: BTreeMap<String, String> = instruments
            .iter()
            .map(|inst| {
                let sector = inst
                    .sector()
                    .map(str::to_string)
                    .or_else(|| sectors.get(inst.symbol()).cloned())
                    .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string());
                (inst.symbol().to_string(), sector)
            })
            .collect();

        let weights = portfolio.weights();
        let amounts = split_amount(amount, &weights)?;
        let allocations = portfolio
            .holdings
            .iter()
            .zip(amounts)
            .map(|(holding, amount)| HoldingAllocation {
                symbol: holding.symbol.clone(),
                sector: sector_map
                    .get(&holding.symbol)
                    .cloned()
                    .unwrap_or_else(|| UNCLASSIFIED_SECTOR.to_string()),
                weight: holding.weight,
                amount,
            })
            .collect();

        let columns: Vec<&[f64]> = instruments.iter().map(Instrument::returns).collect();
        let series = portfolio_series(&columns, &weights);
        let month_start = series.len().saturating_sub(MONTH_PERIODS);

        let profile = Self {
            user_id: user_id.into(),
            risk_score: assessment.score,
            risk_level: assessment.level,
            preferences,
            reference,
            starting_investment_amount: amount,
            allocations,
            sector_weights: portfolio.sector_weights(&sector_map),
            stats: portfolio.stats,
            total_change: compounded_change(&series),
            monthly_change: compounded_change(&series[month_start..]),
            daily_change: series.last().copied().unwrap_or(0.0),
            created_at: Utc::now(),
        };

        tracing::info!(
            user_id = %profile.user_id,
            risk_level = %profile.risk_level,
            reference = ?profile.reference,
            amount = %profile.starting_investment_amount,
            "built investor profile"
        );

        Ok(profile)
    }

    pub fn summary(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();
        out.push_str(&format!("Investor {} - risk level {} (score {})\n", self.user_id, self.risk_level, self.risk_score));
        out.push_str(&format!("Portfolio: {} (${:.2})\n", self.reference.title(), self.starting_investment_amount));
        out.push_str(&format!("  Returns:      {:.2}%\n", s.annual_return * 100.0));
        out.push_str(&format!("  Volatility:   {:.2}%\n", s.annual_volatility * 100.0));
        out.push_str(&format!("  Max Loss:     {:.2}%\n", s.annual_max_loss * 100.0));
        out.push_str(&format!("  Sharpe Ratio: {:.2}\n", s.sharpe_ratio));
        out.push_str(&format!(
            "  Change:       total {:+.2}%, month {:+.2}%, day {:+.2}%\n",
            self.total_change * 100.0,
            self.monthly_change * 100.0,
            self.daily_change * 100.0
        ));
        out.push_str("Holdings:\n");
        for alloc in &self.allocations {
            out.push_str(&format!(
                "  {:<6} {:>6.2}%  ${:>10.2}  {}\n",
                alloc.symbol,
                alloc.weight * 100.0,
                alloc.amount,
                alloc.sector
            ));
        }
        out.push_str("Sectors:\n");
        for (sector, weight) in &self.sector_weights {
            out.push_str(&format!("  {sector}: {:.2}%\n", weight * 100.0));
        }
        out
    }
}

/// Split a whole-cents `amount` by weight; the rounding remainder goes to the
/// largest holding so the parts add up to `amount` exactly.
fn split_amount(amount: Decimal, weights: &[f64]) -> Result<Vec<Decimal>> {
    let mut parts = weights
        .iter()
        .map(|&w| {
            Decimal::from_f64(w)
                .map(|w| (amount * w).round_dp(2))
                .ok_or_else(|| AdvisorError::InvalidWeights(format!("weight {w} is not representable")))
        })
        .collect::<Result<Vec<_>>>()?;

    let largest = weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(i, _)| i);
    if let Some(i) = largest {
        let allocated: Decimal = parts.iter().sum();
        parts[i] += amount - allocated;
    }
    Ok(parts)
}
