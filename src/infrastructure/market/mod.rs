//! Simulated market feed.
//!
//! A deterministic random-walk tick source so swarm optimization runs
//! end-to-end without external ingestion. Prices are a pure function of
//! (seed, pair, second), so repeated fetches agree and `since` filtering
//! behaves like a real feed.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::models::MarketTick;
use crate::domain::ports::{MarketDataSource, SyndicateResult};

/// Tick cadence of the simulated feed, in seconds.
const TICK_INTERVAL_SECS: i64 = 1;

/// Deterministic pseudo-market tick source.
pub struct SimulatedMarketFeed {
    seed: u64,
}

impl SimulatedMarketFeed {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn pair_base(pair: &str) -> f64 {
        // Stable per-pair base price derived from the name
        let sum: u32 = pair.bytes().map(u32::from).sum();
        50.0 + f64::from(sum % 400)
    }

    fn tick_at(&self, pair: &str, second: i64) -> MarketTick {
        let pair_hash: u64 = pair.bytes().map(u64::from).sum();
        let mut rng = StdRng::seed_from_u64(
            self.seed
                .wrapping_mul(31)
                .wrapping_add(pair_hash)
                .wrapping_add(second as u64),
        );
        let base = Self::pair_base(pair);
        let wave = (second as f64 / 45.0).sin() * 0.06;
        let noise: f64 = rng.gen_range(-0.01..0.01);
        MarketTick {
            pair: pair.to_string(),
            timestamp: Utc.timestamp_opt(second, 0).single().expect("valid timestamp"),
            price: base * (1.0 + wave + noise),
            volume: rng.gen_range(0.1..10.0),
        }
    }
}

#[async_trait]
impl MarketDataSource for SimulatedMarketFeed {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn fetch(
        &self,
        pair: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> SyndicateResult<Vec<MarketTick>> {
        let now = Utc::now().timestamp();
        let limit = limit.max(1) as i64;
        let window_start = now - limit * TICK_INTERVAL_SECS;
        let start = match since {
            Some(since) => (since.timestamp() + TICK_INTERVAL_SECS).max(window_start),
            None => window_start,
        };

        let mut ticks = Vec::new();
        let mut second = start;
        while second <= now {
            ticks.push(self.tick_at(pair, second));
            second += TICK_INTERVAL_SECS;
        }
        Ok(ticks)
    }
}
