use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::numerics::gaussian;
use crate::feed::MarketFeed;
use crate::models::market::{
    Bar, BookLevel, FastStream, MarketBundle, OptionQuote, OptionRight, OrderBook, Print,
    SlowStream,
};

/// Bars carried per bundle.
const BAR_WINDOW: usize = 120;
/// Strikes quoted on either side of spot.
const STRIKES_PER_SIDE: i64 = 5;

/// Random-walk bundle generator so the engine can run without any
/// transport. Deterministic under a fixed seed.
pub struct SyntheticFeed {
    symbol: String,
    rng: StdRng,
    price: f64,
    bars: Vec<Bar>,
    sequence: i64,
}

impl SyntheticFeed {
    pub fn new(symbol: &str, start_price: f64, seed: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            bars: Vec::new(),
            sequence: 0,
        }
    }

    fn step(&mut self, now_ms: i64) -> MarketBundle {
        self.sequence += 1;
        let drift = gaussian(&mut self.rng, 0.0, self.price * 0.001);
        let open = self.price;
        self.price = (self.price + drift).max(1.0);
        let close = self.price;

        self.bars.push(Bar {
            timestamp: now_ms,
            open,
            high: open.max(close) * 1.0005,
            low: open.min(close) * 0.9995,
            close,
            volume: 50.0 + self.rng.gen_range(0.0..100.0),
        });
        if self.bars.len() > BAR_WINDOW {
            self.bars.remove(0);
        }

        let spread = close * 0.0002;
        let book = OrderBook {
            timestamp: now_ms,
            bids: (1..=5)
                .map(|i| BookLevel {
                    price: close - spread * i as f64,
                    size: 50.0 + self.rng.gen_range(0.0..150.0),
                })
                .collect(),
            asks: (1..=5)
                .map(|i| BookLevel {
                    price: close + spread * i as f64,
                    size: 50.0 + self.rng.gen_range(0.0..150.0),
                })
                .collect(),
        };

        let prints: Vec<Print> = (0..10)
            .map(|i| Print {
                timestamp: now_ms - i * 100,
                price: close * (1.0 + gaussian(&mut self.rng, 0.0, 0.0003)),
                size: self.rng.gen_range(1.0..20.0),
            })
            .collect();

        let chain = self.chain(close, now_ms);

        MarketBundle {
            symbol: self.symbol.clone(),
            timestamp: now_ms,
            fast: FastStream {
                bars: self.bars.clone(),
                prints,
                book,
            },
            slow: SlowStream {
                bars: Vec::new(),
                prints: Vec::new(),
            },
            chain,
        }
    }

    fn chain(&mut self, spot: f64, now_ms: i64) -> Vec<OptionQuote> {
        let step = (spot * 0.01).max(0.5);
        let atm = (spot / step).round() * step;
        let week_ms: i64 = 7 * 24 * 3_600_000;
        let mut chain = Vec::new();

        for expiry_weeks in [1i64, 4] {
            let expiry = now_ms + expiry_weeks * week_ms;
            for offset in -STRIKES_PER_SIDE..=STRIKES_PER_SIDE {
                let strike = atm + offset as f64 * step;
                let moneyness = (spot - strike) / spot;
                let call_delta = (0.5 + 4.0 * moneyness).clamp(0.02, 0.98);
                let gamma = (0.05 * (1.0 - (moneyness * 10.0).abs())).max(0.001);
                let iv = 0.18 + 0.02 * (offset.abs() as f64 / STRIKES_PER_SIDE as f64)
                    + self.rng.gen_range(0.0..0.01);
                for right in [OptionRight::Call, OptionRight::Put] {
                    let delta = match right {
                        OptionRight::Call => call_delta,
                        OptionRight::Put => call_delta - 1.0,
                    };
                    chain.push(OptionQuote {
                        strike,
                        expiry,
                        right,
                        bid: 1.0,
                        ask: 1.2,
                        last: 1.1,
                        volume: self.rng.gen_range(10.0..200.0),
                        open_interest: self.rng.gen_range(100.0..2_000.0),
                        implied_vol: iv,
                        delta,
                        gamma,
                        theta: -0.02,
                        vega: 0.1,
                        rho: 0.01,
                    });
                }
            }
        }
        chain
    }
}

#[async_trait]
impl MarketFeed for SyntheticFeed {
    async fn next_bundle(&mut self) -> Result<MarketBundle> {
        Ok(self.step(Utc::now().timestamp_millis()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundles_grow_history_and_stay_consistent() {
        let mut feed = SyntheticFeed::new("TEST", 100.0, 7);
        let a = feed.step(1_000);
        assert_eq!(a.fast.bars.len(), 1);
        assert!(!a.chain.is_empty());
        assert!(!a.fast.book.bids.is_empty());

        let b = feed.step(2_000);
        assert_eq!(b.fast.bars.len(), 2);
        assert!(b.spot() > 0.0);
    }

    #[test]
    fn bar_window_is_bounded() {
        let mut feed = SyntheticFeed::new("TEST", 100.0, 7);
        for i in 0..200 {
            feed.step(1_000 * i);
        }
        let bundle = feed.step(1_000_000);
        assert_eq!(bundle.fast.bars.len(), BAR_WINDOW);
    }

    #[test]
    fn same_seed_same_prices() {
        let mut a = SyntheticFeed::new("TEST", 100.0, 11);
        let mut b = SyntheticFeed::new("TEST", 100.0, 11);
        for i in 0..10 {
            let ba = a.step(i * 1_000);
            let bb = b.step(i * 1_000);
            assert_eq!(ba.spot(), bb.spot());
        }
    }
}
