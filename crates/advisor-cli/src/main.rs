//! portfolio-advisor terminal client
//!
//! Runs the new-user questionnaire, shows stored profiles and the expert
//! view of the reference portfolios.

mod menu;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portfolio_advisor::{
    AdvisorService, AdvisorSettings, HttpMarketData, InMemoryMarketData, MarketData, RiskLevel,
};

use crate::menu::{MenuAction, MenuState, transition};

/// History length of the generated demo data set
const DEMO_PERIODS: usize = 756;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let settings = AdvisorSettings::from_env().context("reading advisor settings")?;
    let market = market_data(&settings).await?;

    if market.health_check().await {
        tracing::info!("✓ Market data source: {}", market.name());
    } else {
        tracing::warn!("⚠ Market data source {} is not reachable", market.name());
    }
    tracing::info!("Universe: {}", settings.symbols.join(", "));

    let threads = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let service = AdvisorService::new(market, settings).with_threads(threads);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = MenuState::Main;

    while state != MenuState::Exit {
        print!("{}", state.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let (next, action) = transition(state, &line);
        state = next;
        perform(&service, action).await?;
    }

    tracing::info!("Goodbye");
    Ok(())
}

/// HTTP when a base URL is configured, then a JSON file, then demo data.
async fn market_data(settings: &AdvisorSettings) -> anyhow::Result<Arc<dyn MarketData>> {
    let source = &settings.market_data;
    if source.base_url.is_some() {
        return Ok(Arc::new(HttpMarketData::from_settings(source)?));
    }
    if let Some(path) = &source.file {
        let data = InMemoryMarketData::from_json_file(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
        return Ok(Arc::new(data));
    }

    tracing::warn!("No market data configured - using generated demo data");
    Ok(Arc::new(InMemoryMarketData::demo(settings.selector.seed, DEMO_PERIODS)?))
}

async fn perform(service: &AdvisorService, action: MenuAction) -> anyhow::Result<()> {
    match action {
        MenuAction::None | MenuAction::Quit => {}
        MenuAction::Invalid(msg) => println!("Invalid input: {msg}"),
        MenuAction::Recommend(request) => match service.recommend(request).await {
            Ok(profile) => {
                println!("\n{}", profile.summary());
                tracing::debug!("{}", serde_json::to_string(&profile)?);
            }
            Err(err) => {
                tracing::error!(error = %err, "recommendation failed");
                println!("{}", err.user_message());
            }
        },
        MenuAction::ShowProfile(user_id) => match service.profile(&user_id).await {
            Some(profile) => println!("\n{}", profile.summary()),
            None => println!("No portfolio stored for '{user_id}'."),
        },
        MenuAction::ShowFrontier(model) => match service.frontier(model, RiskLevel::Medium).await {
            Ok(references) => println!("\n{}", references.summary()),
            Err(err) => {
                tracing::error!(error = %err, "frontier failed");
                println!("{}", err.user_message());
            }
        },
        MenuAction::ShowDistribution(model) => match service.distributions(model).await {
            Ok(distributions) => println!("\n{}", distributions.summary()),
            Err(err) => {
                tracing::error!(error = %err, "distributions failed");
                println!("{}", err.user_message());
            }
        },
        MenuAction::ShowBollinger(symbol) => match service.bollinger(&symbol).await {
            Ok(bands) => println!("\n{}", bands.summary()),
            Err(err) => {
                tracing::error!(error = %err, symbol = %symbol, "bollinger failed");
                println!("{}", err.user_message());
            }
        },
        MenuAction::RankInstruments(model) => match service.rank_instruments(model).await {
            Ok(ranking) => println!("\n{}", ranking.summary()),
            Err(err) => {
                tracing::error!(error = %err, "ranking failed");
                println!("{}", err.user_message());
            }
        },
    }
    Ok(())
}
