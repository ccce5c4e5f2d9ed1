//! Market Data Integration
//!
//! Abstractions and implementations for instrument return histories.

mod http;
mod memory;

pub use http::{HttpMarketData, InstrumentsResponse};
pub use memory::{demo_symbols, InMemoryMarketData, DEMO_UNIVERSE};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Instrument;

/// Market data source (Strategy pattern)
///
/// Implement this for each provider: a cache, a vendor API, a file dump.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Get the return history for one symbol
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument>;

    /// Get return histories for several symbols, in request order.
    ///
    /// Fails on the first missing symbol; the selector needs the whole universe.
    async fn fetch_instruments(&self, symbols: &[String]) -> Result<Vec<Instrument>> {
        let mut instruments = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            instruments.push(self.fetch_instrument(symbol).await?);
        }
        Ok(instruments)
    }

    /// Check if the source is available
    async fn health_check(&self) -> bool;

    /// Source name
    fn name(&self) -> &str;
}
