use crate::models::market::{
    Bar, BookLevel, FastStream, MarketBundle, OptionQuote, OptionRight, OrderBook, SlowStream,
};

pub const BASE_TS: i64 = 1_700_000_000_000;

/// Bundle with 1-minute bars from the given closes and a balanced book
/// around the last close. No chain, no prints.
pub fn bundle_with_closes(closes: &[f64]) -> MarketBundle {
    let bars: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: BASE_TS + i as i64 * 60_000,
            open: close,
            high: close * 1.0005,
            low: close * 0.9995,
            close,
            volume: 100.0,
        })
        .collect();

    let last = closes.last().copied().unwrap_or(0.0);
    let timestamp = bars.last().map(|b| b.timestamp).unwrap_or(BASE_TS);
    MarketBundle {
        symbol: "TEST".to_string(),
        timestamp,
        fast: FastStream {
            bars,
            prints: Vec::new(),
            book: neutral_book(last, timestamp),
        },
        slow: SlowStream::default(),
        chain: Vec::new(),
    }
}

pub fn bundle_with_chain(closes: &[f64], chain: Vec<OptionQuote>) -> MarketBundle {
    let mut bundle = bundle_with_closes(closes);
    bundle.chain = chain;
    bundle
}

/// Balanced five-level book centered on `mid`.
pub fn neutral_book(mid: f64, timestamp: i64) -> OrderBook {
    if mid <= 0.0 {
        return OrderBook::default();
    }
    let spread = mid * 0.0002;
    OrderBook {
        timestamp,
        bids: (1..=5)
            .map(|i| BookLevel {
                price: mid - spread * i as f64,
                size: 100.0,
            })
            .collect(),
        asks: (1..=5)
            .map(|i| BookLevel {
                price: mid + spread * i as f64,
                size: 100.0,
            })
            .collect(),
    }
}

/// A chain with one heavy strike just above `spot`:
/// gamma * openInterest * 100 = 2e6, implied vol 20%.
pub fn squeeze_chain(spot: f64) -> Vec<OptionQuote> {
    vec![OptionQuote {
        strike: spot * 1.005,
        expiry: BASE_TS + 7 * 24 * 3_600_000,
        right: OptionRight::Call,
        bid: 1.0,
        ask: 1.2,
        last: 1.1,
        volume: 500.0,
        open_interest: 100_000.0,
        implied_vol: 0.2,
        delta: 0.5,
        gamma: 0.2,
        theta: -0.02,
        vega: 0.1,
        rho: 0.01,
    }]
}
