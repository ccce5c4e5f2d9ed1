//! Instrument Ranking
//!
//! Scores every instrument on its own and lists the best by return, by risk
//! and by Sharpe ratio.

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::{Instrument, PortfolioStats, ReferenceKind, StatModel};
use crate::strategy::SelectorConfig;
use crate::strategy::stats::compute_stats;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedInstrument {
    pub symbol: String,
    pub stats: PortfolioStats,
}

/// Top instruments per objective, best first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRanking {
    pub model: StatModel,
    pub min_risk: Vec<RankedInstrument>,
    pub best_risk_adjusted: Vec<RankedInstrument>,
    pub max_return: Vec<RankedInstrument>,
}

impl InstrumentRanking {
    pub fn get(&self, kind: ReferenceKind) -> &[RankedInstrument] {
        match kind {
            ReferenceKind::MinRisk => &self.min_risk,
            ReferenceKind::BestRiskAdjusted => &self.best_risk_adjusted,
            ReferenceKind::MaxReturn => &self.max_return,
        }
    }

    pub fn summary(&self) -> String {
        let mut out = format!("Top instruments ({} model)\n", self.model);
        for kind in ReferenceKind::ALL {
            out.push_str(&format!("{}:\n", kind.title()));
            for (rank, item) in self.get(kind).iter().enumerate() {
                let s = &item.stats;
                out.push_str(&format!(
                    "  {}. {:<6} return {:>7.2}%  {} {:>6.2}%  sharpe {:.2}\n",
                    rank + 1,
                    item.symbol,
                    s.annual_return * 100.0,
                    self.model.dispersion_label(),
                    s.annual_dispersion * 100.0,
                    s.sharpe_ratio
                ));
            }
        }
        out
    }
}

/// Rank each instrument as a single-holding portfolio.
///
/// Ties keep universe order. `top` larger than the universe lists everything.
pub fn rank_instruments(instruments: &[Instrument], config: &SelectorConfig, top: usize) -> Result<InstrumentRanking> {
    if top == 0 {
        return Err(AdvisorError::InvalidParameter("ranking needs at least 1 entry per list".into()));
    }
    if instruments.is_empty() {
        return Err(AdvisorError::InsufficientUniverse { got: 0, min: 1 });
    }

    let params = config.annualization();
    let scored = instruments
        .iter()
        .map(|inst| {
            if inst.len() < 2 {
                return Err(AdvisorError::InsufficientHistory(format!(
                    "{} has {} periods, need at least 2",
                    inst.symbol(),
                    inst.len()
                )));
            }
            Ok(RankedInstrument {
                symbol: inst.symbol().to_string(),
                stats: compute_stats(inst.returns(), config.model, params),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let top_by = |key: fn(&PortfolioStats) -> f64, ascending: bool| {
        let mut list = scored.clone();
        list.sort_by(|a, b| {
            let ord = key(&a.stats).total_cmp(&key(&b.stats));
            if ascending { ord } else { ord.reverse() }
        });
        list.truncate(top);
        list
    };

    let ranking = InstrumentRanking {
        model: config.model,
        min_risk: top_by(|s| s.annual_dispersion, true),
        best_risk_adjusted: top_by(|s| s.sharpe_ratio, false),
        max_return: top_by(|s| s.annual_return, false),
    };

    tracing::info!(
        instruments = instruments.len(),
        top,
        model = %config.model,
        "ranked instruments"
    );

    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn instrument(symbol: &str, returns: Vec<f64>) -> Instrument {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..returns.len()).map(|i| start + Duration::days(i as i64)).collect();
        Instrument::new(symbol, dates, returns).unwrap()
    }

    fn universe() -> Vec<Instrument> {
        vec![
            // high return, high risk
            instrument("FAST", vec![0.05, -0.03, 0.06, -0.02]),
            // low return, almost no risk
            instrument("SAFE", vec![0.001, 0.0012, 0.001, 0.0011]),
            // middling
            instrument("MID", vec![0.01, 0.0, 0.012, 0.002]),
        ]
    }

    fn symbols(list: &[RankedInstrument]) -> Vec<&str> {
        list.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn test_rankings_per_objective() {
        let ranking = rank_instruments(&universe(), &SelectorConfig::default(), 3).unwrap();

        assert_eq!(symbols(&ranking.max_return), vec!["FAST", "MID", "SAFE"]);
        assert_eq!(symbols(&ranking.min_risk), vec!["SAFE", "MID", "FAST"]);
        assert_eq!(ranking.best_risk_adjusted[0].symbol, "SAFE");
        assert!(ranking.summary().contains("Safest Portfolio"));
    }

    #[test]
    fn test_top_truncates() {
        let ranking = rank_instruments(&universe(), &SelectorConfig::default(), 1).unwrap();
        for kind in ReferenceKind::ALL {
            assert_eq!(ranking.get(kind).len(), 1);
        }

        let ranking = rank_instruments(&universe(), &SelectorConfig::default(), 10).unwrap();
        assert_eq!(ranking.max_return.len(), 3);
    }

    #[test]
    fn test_gini_model_ranks_by_gini_dispersion() {
        let config = SelectorConfig::default().with_model(StatModel::Gini);
        let ranking = rank_instruments(&universe(), &config, 3).unwrap();
        assert_eq!(ranking.model, StatModel::Gini);
        let first = &ranking.min_risk[0].stats;
        assert!(first.annual_dispersion < first.annual_volatility);
    }

    #[test]
    fn test_rejects_empty_and_short() {
        let config = SelectorConfig::default();
        assert!(matches!(
            rank_instruments(&[], &config, 3),
            Err(AdvisorError::InsufficientUniverse { got: 0, .. })
        ));
        assert!(matches!(
            rank_instruments(&universe(), &config, 0),
            Err(AdvisorError::InvalidParameter(_))
        ));

        let short = vec![instrument("ONE", vec![0.01])];
        assert!(matches!(
            rank_instruments(&short, &config, 3),
            Err(AdvisorError::InsufficientHistory(_))
        ));
    }
}
