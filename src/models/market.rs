use serde::{Deserialize, Serialize};
use std::fmt;

/// One OHLCV bar. Timestamps are Unix milliseconds throughout the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A recent trade print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Print {
    pub timestamp: i64,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Bid => write!(f, "bid"),
            BookSide::Ask => write!(f, "ask"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub timestamp: i64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    /// Midpoint of best bid/ask; falls back to whichever side exists.
    pub fn mid(&self) -> f64 {
        match (self.bids.first(), self.asks.first()) {
            (Some(b), Some(a)) => (b.price + a.price) / 2.0,
            (Some(b), None) => b.price,
            (None, Some(a)) => a.price,
            (None, None) => 0.0,
        }
    }

    pub fn bid_volume(&self) -> f64 {
        self.bids.iter().map(|l| l.size).sum()
    }

    pub fn ask_volume(&self) -> f64 {
        self.asks.iter().map(|l| l.size).sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.bid_volume() + self.ask_volume()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionRight::Call => write!(f, "call"),
            OptionRight::Put => write!(f, "put"),
        }
    }
}

/// One option quote: strike x expiry x right with market data and the
/// five sensitivities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    pub expiry: i64,
    pub right: OptionRight,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: f64,
    pub open_interest: f64,
    pub implied_vol: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Fast-timeframe stream: bars, recent prints, and the order book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FastStream {
    pub bars: Vec<Bar>,
    pub prints: Vec<Print>,
    pub book: OrderBook,
}

/// Slow-timeframe stream: bars and prints only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlowStream {
    pub bars: Vec<Bar>,
    pub prints: Vec<Print>,
}

/// The raw observation bundle ingested on every tick. All arrays may be
/// empty; the pipeline must still produce a valid state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBundle {
    pub symbol: String,
    pub timestamp: i64,
    pub fast: FastStream,
    pub slow: SlowStream,
    pub chain: Vec<OptionQuote>,
}

impl MarketBundle {
    pub fn empty(symbol: &str, timestamp: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            fast: FastStream::default(),
            slow: SlowStream::default(),
            chain: Vec::new(),
        }
    }

    /// Spot price: last fast close, else book mid, else 0.
    pub fn spot(&self) -> f64 {
        if let Some(bar) = self.fast.bars.last() {
            return bar.close;
        }
        self.fast.book.mid()
    }
}
