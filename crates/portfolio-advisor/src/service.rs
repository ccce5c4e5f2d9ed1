//! Advisor Service
//!
//! Fetch -> score -> select -> profile. Holds the market data source, the
//! settings and the profiles built during this process's lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::config::AdvisorSettings;
use crate::error::{AdvisorError, Result};
use crate::market::MarketData;
use crate::model::{AlgorithmPreferences, Instrument, RiskLevel, StatModel, ThreeReferencePortfolios};
use crate::profile::InvestorProfile;
use crate::strategy::{
    rank_instruments, BollingerBands, FrontierDistributions, InstrumentRanking, PortfolioSelector,
    QuestionnaireAnswers, RiskAssessment, RiskScorer,
};

/// Everything the new-user flow collects
#[derive(Clone, Debug, PartialEq)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub answers: [i64; 3],
    pub preferences: AlgorithmPreferences,
    pub amount: Decimal,
}

pub struct AdvisorService {
    market: Arc<dyn MarketData>,
    settings: AdvisorSettings,
    scorer: RiskScorer,
    threads: usize,
    profiles: Arc<RwLock<HashMap<String, InvestorProfile>>>,
}

impl AdvisorService {
    pub fn new(market: Arc<dyn MarketData>, settings: AdvisorSettings) -> Self {
        Self {
            market,
            settings,
            scorer: RiskScorer::new(),
            threads: 1,
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Evaluate candidates on this many worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn settings(&self) -> &AdvisorSettings {
        &self.settings
    }

    pub fn market_name(&self) -> &str {
        self.market.name()
    }

    pub async fn health_check(&self) -> bool {
        self.market.health_check().await
    }

    /// Fetch the configured universe, in configured order
    pub async fn load_universe(&self) -> Result<Vec<Instrument>> {
        let instruments = self.market.fetch_instruments(&self.settings.symbols).await?;
        tracing::debug!(
            source = self.market.name(),
            instruments = instruments.len(),
            "loaded instrument universe"
        );
        Ok(instruments)
    }

    pub fn assess(&self, answers: [i64; 3]) -> Result<RiskAssessment> {
        let [a, b, c] = answers;
        Ok(self.scorer.assess(QuestionnaireAnswers::new(a, b, c)?))
    }

    /// The three reference portfolios of the configured universe
    pub async fn frontier(&self, model: StatModel, risk_level: RiskLevel) -> Result<ThreeReferencePortfolios> {
        let instruments = self.load_universe().await?;
        self.select(instruments, model, risk_level).await
    }

    /// Monthly return distributions of the three reference portfolios
    pub async fn distributions(&self, model: StatModel) -> Result<FrontierDistributions> {
        let instruments = self.load_universe().await?;
        let references = self.select(instruments.clone(), model, RiskLevel::Medium).await?;
        FrontierDistributions::from_references(&references, &instruments)
    }

    /// Bollinger bands and signals for one symbol, in or out of the universe
    pub async fn bollinger(&self, symbol: &str) -> Result<BollingerBands> {
        let instrument = self.market.fetch_instrument(symbol).await?;
        let bands = BollingerBands::for_instrument(&instrument, self.settings.bollinger)?;
        tracing::info!(
            symbol = %bands.symbol,
            buys = bands.buy_count(),
            sells = bands.sell_count(),
            "computed bollinger signals"
        );
        Ok(bands)
    }

    /// Best single instruments of the configured universe
    pub async fn rank_instruments(&self, model: StatModel) -> Result<InstrumentRanking> {
        let instruments = self.load_universe().await?;
        let config = self.settings.selector.clone().with_model(model);
        rank_instruments(&instruments, &config, self.settings.ranking_top)
    }

    /// Run the whole new-user flow and keep the resulting profile.
    pub async fn recommend(&self, request: RecommendationRequest) -> Result<InvestorProfile> {
        let assessment = self.assess(request.answers)?;
        let instruments = self.load_universe().await?;
        let references = self
            .select(instruments.clone(), request.preferences.model, assessment.level)
            .await?;

        let profile = InvestorProfile::build(
            request.user_id,
            &assessment,
            request.preferences,
            request.amount,
            &references,
            &instruments,
            &self.settings.sectors,
        )?;

        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());

        Ok(profile)
    }

    pub async fn profile(&self, user_id: &str) -> Option<InvestorProfile> {
        self.profiles.read().await.get(user_id).cloned()
    }

    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Selection is CPU bound; run it off the async workers.
    async fn select(
        &self,
        instruments: Vec<Instrument>,
        model: StatModel,
        risk_level: RiskLevel,
    ) -> Result<ThreeReferencePortfolios> {
        let config = self.settings.selector.clone().with_model(model);
        let samples = config.num_samples;
        let threads = self.threads;

        tokio::task::spawn_blocking(move || {
            PortfolioSelector::new(config).select_parallel(&instruments, risk_level, samples, threads)
        })
        .await
        .map_err(|e| AdvisorError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::InMemoryMarketData;
    use crate::model::ReferenceKind;
    use rust_decimal_macros::dec;

    fn service() -> AdvisorService {
        let mut settings = AdvisorSettings::default();
        settings.selector.num_samples = 300;
        let market = InMemoryMarketData::demo(7, 120).unwrap();
        AdvisorService::new(Arc::new(market), settings)
    }

    fn request(user_id: &str, answers: [i64; 3]) -> RecommendationRequest {
        RecommendationRequest {
            user_id: user_id.to_string(),
            answers,
            preferences: AlgorithmPreferences::default(),
            amount: dec!(10000),
        }
    }

    #[tokio::test]
    async fn test_recommend_stores_profile() {
        let service = service();
        let profile = service.recommend(request("alice", [3, 3, 2])).await.unwrap();

        assert_eq!(profile.risk_score, 8);
        assert_eq!(profile.risk_level, RiskLevel::High);
        assert_eq!(profile.reference, ReferenceKind::MaxReturn);
        assert_eq!(profile.allocations.len(), service.settings().symbols.len());
        assert_eq!(profile.allocations.iter().map(|a| a.amount).sum::<Decimal>(), dec!(10000));

        assert_eq!(service.profile("alice").await, Some(profile));
        assert_eq!(service.profile_count().await, 1);
        assert!(service.profile("bob").await.is_none());
    }

    #[tokio::test]
    async fn test_recommend_rejects_bad_answers() {
        let service = service();
        let err = service.recommend(request("carol", [1, 4, 2])).await.unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidAnswerRange { index: 2, value: 4, .. }));
        assert_eq!(service.profile_count().await, 0);
    }

    #[tokio::test]
    async fn test_frontier_matches_direct_selection() {
        let service = service();
        let via_service = service.frontier(StatModel::Gini, RiskLevel::Medium).await.unwrap();

        let instruments = service.load_universe().await.unwrap();
        let config = service.settings().selector.clone().with_model(StatModel::Gini);
        let direct = PortfolioSelector::new(config)
            .select(&instruments, RiskLevel::Medium, 300)
            .unwrap();

        assert_eq!(via_service, direct);
        assert_eq!(via_service.model, StatModel::Gini);
    }

    #[tokio::test]
    async fn test_threads_do_not_change_result() {
        let single = service().frontier(StatModel::Markowitz, RiskLevel::Low).await.unwrap();
        let multi = service()
            .with_threads(4)
            .frontier(StatModel::Markowitz, RiskLevel::Low)
            .await
            .unwrap();
        assert_eq!(single, multi);
    }

    #[tokio::test]
    async fn test_distributions_cover_three_references() {
        let dists = service().distributions(StatModel::Markowitz).await.unwrap();
        assert_eq!(dists.entries.len(), 3);
        assert!(dists.entries.iter().all(|(_, d)| d.count >= 4));
    }

    #[tokio::test]
    async fn test_bollinger_for_symbol() {
        let service = service();
        let bands = service.bollinger("tlt").await.unwrap();
        assert_eq!(bands.symbol, "TLT");
        assert_eq!(bands.prices.len(), 120);
        assert!(bands.upper[19].is_some());
        assert!(bands.upper[18].is_none());

        let err = service.bollinger("NOPE").await.unwrap_err();
        assert!(matches!(err, AdvisorError::UnknownInstrument(_)));
    }

    #[tokio::test]
    async fn test_rank_instruments_uses_settings() {
        let service = service();
        let ranking = service.rank_instruments(StatModel::Gini).await.unwrap();
        assert_eq!(ranking.model, StatModel::Gini);
        assert_eq!(ranking.max_return.len(), service.settings().ranking_top);
        assert!(
            ranking
                .max_return
                .windows(2)
                .all(|w| w[0].stats.annual_return >= w[1].stats.annual_return)
        );
    }

    #[tokio::test]
    async fn test_unknown_symbol_in_settings() {
        let mut service = service();
        service.settings.symbols.push("NOPE".to_string());
        let err = service.frontier(StatModel::Markowitz, RiskLevel::Low).await.unwrap_err();
        assert!(matches!(err, AdvisorError::UnknownInstrument(_)));
    }
}
