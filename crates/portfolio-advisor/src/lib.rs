//! # portfolio-advisor
//!
//! Turns a short risk questionnaire into a recommended stock portfolio.
//!
//! Three answers (1..=3 each) are summed into a risk score and mapped to a
//! risk level. Random long-only weightings of the instrument universe are
//! then evaluated, and three reference portfolios are picked from the
//! sampled frontier: the least dispersed, the best risk-adjusted and the
//! highest returning. The risk level decides which one the investor gets.
//!
//! ## Flow
//!
//! ```text
//! ┌───────────────┐   ┌─────────────┐   ┌─────────────────────┐
//! │ Questionnaire │──▶│ RiskScorer  │──▶│ Low / Medium / High │
//! │  (1..=3) x 3  │   │ score 3..=9 │   └──────────┬──────────┘
//! └───────────────┘   └─────────────┘              │
//!                                                  ▼
//! ┌───────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │  MarketData   │──▶│ PortfolioSelector │──▶│ InvestorProfile  │
//! │ (instruments) │   │  N candidates     │   │  MinRisk         │
//! └───────────────┘   │  Markowitz / Gini │   │  BestRiskAdjusted│
//!                     └───────────────────┘   │  MaxReturn       │
//!                                             └──────────────────┘
//! ```
//!
//! The expert views add per-instrument rankings, Bollinger band signals and
//! the monthly return distribution of the reference portfolios.
//!
//! The scoring and selection core is synchronous and pure; only market data
//! fetching is async.

pub mod config;
pub mod error;
pub mod market;
pub mod model;
pub mod profile;
pub mod service;
pub mod strategy;

pub use config::{AdvisorSettings, MarketDataSettings};
pub use error::{AdvisorError, Result};
pub use market::{HttpMarketData, InMemoryMarketData, MarketData};
pub use model::{
    AlgorithmPreferences, Holding, Instrument, Portfolio, PortfolioStats, ReferenceKind, RiskLevel,
    StatModel, ThreeReferencePortfolios,
};
pub use profile::{HoldingAllocation, InvestorProfile};
pub use service::{AdvisorService, RecommendationRequest};
pub use strategy::{
    BollingerBands, BollingerConfig, FrontierDistributions, InstrumentRanking, PortfolioSelector,
    QuestionnaireAnswers, RiskAssessment, RiskScorer, SelectorConfig,
};
