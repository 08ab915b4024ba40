//! Market data port - tick ingestion for swarm optimization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::MarketTick;
use crate::domain::ports::errors::SyndicateResult;

/// Source of market ticks for a trading pair.
///
/// `since` filters to ticks strictly newer than the given timestamp so
/// callers can poll for fresh data only.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        pair: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> SyndicateResult<Vec<MarketTick>>;
}

/// Null source: always returns an empty window.
#[derive(Debug, Default)]
pub struct NullMarketData;

#[async_trait]
impl MarketDataSource for NullMarketData {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn fetch(
        &self,
        _pair: &str,
        _since: Option<DateTime<Utc>>,
        _limit: usize,
    ) -> SyndicateResult<Vec<MarketTick>> {
        Ok(Vec::new())
    }
}
