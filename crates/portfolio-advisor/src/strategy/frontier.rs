//! Portfolio Selector
//!
//! Samples random long-only weight vectors over an instrument universe and
//! picks the three reference portfolios of the resulting frontier cloud:
//! lowest dispersion, best Sharpe ratio and highest annual return.

use std::cmp::Ordering;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::{
    Holding, Instrument, Portfolio, PortfolioStats, RiskLevel, StatModel,
    ThreeReferencePortfolios, WEIGHT_TOLERANCE,
};
use crate::strategy::stats::{self, Annualization};

/// Selector configuration, passed explicitly per selector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Candidates sampled when the caller does not say otherwise
    pub num_samples: usize,

    /// Seed for the candidate generator
    pub seed: u64,

    /// Periods per year used for annualization (252 for daily data)
    pub periods_per_year: f64,

    /// Annual risk-free rate subtracted in the Sharpe ratio
    pub risk_free_rate: f64,

    /// Dispersion measure
    pub model: StatModel,

    /// Smallest universe accepted
    pub min_instruments: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            num_samples: 2000,
            seed: 42,
            periods_per_year: 252.0,
            risk_free_rate: 0.0,
            model: StatModel::Markowitz,
            min_instruments: 1,
        }
    }
}

impl SelectorConfig {
    pub fn with_model(mut self, model: StatModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub(crate) fn annualization(&self) -> Annualization {
        Annualization {
            periods_per_year: self.periods_per_year,
            risk_free_rate: self.risk_free_rate,
        }
    }
}

/// An evaluated candidate, identified by its generation order
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub index: usize,
    pub stats: PortfolioStats,
}

/// Running best candidates.
///
/// `merge` is commutative and associative: each slot keeps the better of two
/// candidates by value, and exact ties go to the lower generation index, so
/// partial reductions over any split of the candidates combine to the same
/// result as a single sequential pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrontierAccumulator {
    pub min_risk: Option<Candidate>,
    pub best_risk_adjusted: Option<Candidate>,
    pub max_return: Option<Candidate>,
    pub count: usize,
}

impl FrontierAccumulator {
    pub fn push(&mut self, candidate: Candidate) {
        *self = self.merge(Self {
            min_risk: Some(candidate),
            best_risk_adjusted: Some(candidate),
            max_return: Some(candidate),
            count: 1,
        });
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            min_risk: pick(self.min_risk, other.min_risk, |c| c.stats.annual_dispersion, Ordering::Less),
            best_risk_adjusted: pick(
                self.best_risk_adjusted,
                other.best_risk_adjusted,
                |c| c.stats.sharpe_ratio,
                Ordering::Greater,
            ),
            max_return: pick(self.max_return, other.max_return, |c| c.stats.annual_return, Ordering::Greater),
            count: self.count + other.count,
        }
    }
}

/// Keep the candidate whose key compares as `wanted` against the other;
/// equal keys fall back to the earlier candidate.
fn pick(
    a: Option<Candidate>,
    b: Option<Candidate>,
    key: impl Fn(&Candidate) -> f64,
    wanted: Ordering,
) -> Option<Candidate> {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = key(&a).total_cmp(&key(&b));
            if ord == wanted || (ord == Ordering::Equal && a.index < b.index) {
                Some(a)
            } else {
                Some(b)
            }
        }
        (a, None) => a,
        (None, b) => b,
    }
}

/// Validated view of an aligned universe
struct Universe<'a> {
    instruments: &'a [Instrument],
}

impl<'a> Universe<'a> {
    fn columns(&self) -> Vec<&'a [f64]> {
        self.instruments.iter().map(Instrument::returns).collect()
    }

    fn holdings(&self, weights: &[f64]) -> Vec<Holding> {
        self.instruments
            .iter()
            .zip(weights)
            .map(|(inst, &weight)| Holding {
                symbol: inst.symbol().to_string(),
                weight,
            })
            .collect()
    }
}

/// Frontier sampler and reference portfolio picker
#[derive(Clone, Debug, Default)]
pub struct PortfolioSelector {
    config: SelectorConfig,
}

impl PortfolioSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select the three reference portfolios from `num_samples` candidates.
    ///
    /// `risk_level` is recorded on the result; it does not change sampling.
    pub fn select(
        &self,
        instruments: &[Instrument],
        risk_level: RiskLevel,
        num_samples: usize,
    ) -> Result<ThreeReferencePortfolios> {
        self.select_parallel(instruments, risk_level, num_samples, 1)
    }

    /// Same as [`select`](Self::select), evaluating candidates on `threads`
    /// scoped worker threads. Output is identical for any thread count.
    pub fn select_parallel(
        &self,
        instruments: &[Instrument],
        risk_level: RiskLevel,
        num_samples: usize,
        threads: usize,
    ) -> Result<ThreeReferencePortfolios> {
        if num_samples == 0 {
            return Err(AdvisorError::InvalidSampleCount);
        }
        let universe = self.validate(instruments)?;
        let candidates = self.sample_weights(instruments.len(), num_samples);
        let columns = universe.columns();

        let threads = threads.clamp(1, num_samples);
        let chunk_size = num_samples.div_ceil(threads);
        tracing::debug!(
            instruments = instruments.len(),
            num_samples,
            threads,
            model = %self.config.model,
            "evaluating frontier candidates"
        );

        let best = if threads == 1 {
            self.reduce_chunk(&columns, &candidates, 0)
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = candidates
                    .chunks(chunk_size)
                    .enumerate()
                    .map(|(i, chunk)| {
                        let columns = &columns;
                        scope.spawn(move || self.reduce_chunk(columns, chunk, i * chunk_size))
                    })
                    .collect();
                handles.into_iter().try_fold(FrontierAccumulator::default(), |acc, handle| {
                    handle
                        .join()
                        .map(|part| acc.merge(part))
                        .map_err(|_| AdvisorError::Worker("frontier worker panicked".into()))
                })
            })?
        };

        let build = |slot: Option<Candidate>| -> Result<Portfolio> {
            let candidate = slot.ok_or(AdvisorError::InvalidSampleCount)?;
            Ok(Portfolio {
                holdings: universe.holdings(&candidates[candidate.index]),
                stats: candidate.stats,
            })
        };

        let result = ThreeReferencePortfolios {
            risk_level,
            model: self.config.model,
            samples: num_samples,
            min_risk: build(best.min_risk)?,
            best_risk_adjusted: build(best.best_risk_adjusted)?,
            max_return: build(best.max_return)?,
        };

        tracing::info!(
            %risk_level,
            samples = num_samples,
            min_risk = result.min_risk.stats.annual_dispersion,
            best_sharpe = result.best_risk_adjusted.stats.sharpe_ratio,
            max_return = result.max_return.stats.annual_return,
            "selected reference portfolios"
        );

        Ok(result)
    }

    /// Recompute a portfolio's statistics from explicit weights.
    pub fn evaluate(&self, instruments: &[Instrument], weights: &[f64]) -> Result<Portfolio> {
        let universe = self.validate(instruments)?;
        if weights.len() != instruments.len() {
            return Err(AdvisorError::InvalidWeights(format!(
                "{} weights for {} instruments",
                weights.len(),
                instruments.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AdvisorError::InvalidWeights("weights must be finite and non-negative".into()));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AdvisorError::InvalidWeights(format!("weights sum to {total}")));
        }

        let series = stats::portfolio_series(&universe.columns(), weights);
        Ok(Portfolio {
            holdings: universe.holdings(weights),
            stats: stats::compute_stats(&series, self.config.model, self.config.annualization()),
        })
    }

    fn reduce_chunk(&self, columns: &[&[f64]], chunk: &[Vec<f64>], offset: usize) -> FrontierAccumulator {
        let params = self.config.annualization();
        let mut acc = FrontierAccumulator::default();
        for (i, weights) in chunk.iter().enumerate() {
            let series = stats::portfolio_series(columns, weights);
            acc.push(Candidate {
                index: offset + i,
                stats: stats::compute_stats(&series, self.config.model, params),
            });
        }
        acc
    }

    fn validate<'a>(&self, instruments: &'a [Instrument]) -> Result<Universe<'a>> {
        let min = self.config.min_instruments.max(1);
        if instruments.len() < min {
            return Err(AdvisorError::InsufficientUniverse {
                got: instruments.len(),
                min,
            });
        }

        for inst in instruments {
            if inst.len() < 2 {
                return Err(AdvisorError::InsufficientHistory(format!(
                    "{} has {} periods, need at least 2",
                    inst.symbol(),
                    inst.len()
                )));
            }
            if let Some(index) = inst.first_non_finite() {
                return Err(AdvisorError::CorruptInstrumentData {
                    symbol: inst.symbol().to_string(),
                    index,
                });
            }
        }

        let reference = &instruments[0];
        if let Some(other) = instruments[1..].iter().find(|i| i.dates() != reference.dates()) {
            return Err(AdvisorError::InsufficientHistory(format!(
                "{} is not aligned with {} ({} vs {} periods)",
                other.symbol(),
                reference.symbol(),
                other.len(),
                reference.len()
            )));
        }

        Ok(Universe { instruments })
    }

    /// Candidate weight vectors in generation order
    fn sample_weights(&self, n: usize, num_samples: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        (0..num_samples)
            .map(|_| {
                let raw: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
                let total: f64 = raw.iter().sum();
                if total > 0.0 {
                    raw.iter().map(|w| w / total).collect()
                } else {
                    vec![1.0 / n as f64; n]
                }
            })
            .collect()
    }
}
