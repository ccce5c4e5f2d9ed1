//! Investment Strategies
//!
//! Questionnaire scoring, frontier-based portfolio selection, and the
//! analysis views of the expert menu.

mod bollinger;
mod distribution;
mod frontier;
mod ranking;
mod risk_scorer;
pub mod stats;

pub use bollinger::{BollingerBands, BollingerConfig, Signal, SignalSide};
pub use distribution::{monthly_changes, FrontierDistributions, ReturnDistribution};
pub use frontier::{Candidate, FrontierAccumulator, PortfolioSelector, SelectorConfig};
pub use ranking::{rank_instruments, InstrumentRanking, RankedInstrument};
pub use risk_scorer::{QuestionnaireAnswers, RiskAssessment, RiskScorer, MAX_ANSWER, MIN_ANSWER};
