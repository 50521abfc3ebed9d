use crate::models::features::{LiquidityLevel, LiquidityMap};
use crate::models::market::{BookSide, OrderBook, Print};

/// Price tolerance for attributing prints to a book level.
const FLOW_TOLERANCE: f64 = 0.001; // 0.1%
/// Band around mid counted as depth.
const DEPTH_BAND: f64 = 0.01; // 1%
/// Prints considered for the absorption rate.
const ABSORPTION_WINDOW: usize = 100;

/// Annotates a raw order book with observed trade flow.
pub struct LiquidityMapper;

impl LiquidityMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map(&self, book: &OrderBook, prints: &[Print]) -> LiquidityMap {
        let bid_vol = book.bid_volume();
        let ask_vol = book.ask_volume();
        let total_vol = bid_vol + ask_vol;
        let mid = book.mid();

        let mut levels = Vec::with_capacity(book.bids.len() + book.asks.len());
        for (side, side_levels, side_vol) in [
            (BookSide::Bid, &book.bids, bid_vol),
            (BookSide::Ask, &book.asks, ask_vol),
        ] {
            for level in side_levels.iter() {
                let flow_rate: f64 = prints
                    .iter()
                    .filter(|p| {
                        level.price > 0.0
                            && (p.price - level.price).abs() / level.price < FLOW_TOLERANCE
                    })
                    .map(|p| p.size)
                    .sum();
                let persistence = if side_vol > 0.0 {
                    level.size / side_vol
                } else {
                    0.0
                };
                levels.push(LiquidityLevel {
                    price: level.price,
                    size: level.size,
                    side,
                    flow_rate,
                    persistence,
                });
            }
        }

        let imbalance = if total_vol > 0.0 {
            (bid_vol - ask_vol) / total_vol
        } else {
            0.0
        };

        let depth = if mid > 0.0 {
            levels
                .iter()
                .filter(|l| (l.price - mid).abs() / mid < DEPTH_BAND)
                .map(|l| l.size)
                .sum()
        } else {
            0.0
        };

        let recent_traded: f64 = prints
            .iter()
            .rev()
            .take(ABSORPTION_WINDOW)
            .map(|p| p.size)
            .sum();
        let absorption_rate = if total_vol > 0.0 {
            recent_traded / total_vol
        } else {
            0.0
        };

        LiquidityMap {
            levels,
            imbalance,
            depth,
            absorption_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::market::BookLevel;

    fn book(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBook {
        OrderBook {
            timestamp: 0,
            bids: bids
                .iter()
                .map(|&(price, size)| BookLevel { price, size })
                .collect(),
            asks: asks
                .iter()
                .map(|&(price, size)| BookLevel { price, size })
                .collect(),
        }
    }

    fn print_at(price: f64, size: f64) -> Print {
        Print {
            timestamp: 0,
            price,
            size,
        }
    }

    #[test]
    fn imbalance_within_bounds_and_sign() {
        let mapper = LiquidityMapper::new();
        let map = mapper.map(&book(&[(99.0, 30.0)], &[(101.0, 10.0)]), &[]);
        assert!((map.imbalance - 0.5).abs() < 1e-9);
        assert!(map.imbalance >= -1.0 && map.imbalance <= 1.0);

        let map = mapper.map(&book(&[], &[]), &[]);
        assert_eq!(map.imbalance, 0.0);
    }

    #[test]
    fn depth_counts_levels_near_mid() {
        let mapper = LiquidityMapper::new();
        // mid = 100; 99.5 and 100.5 are within 1%, 90 and 110 are not
        let map = mapper.map(
            &book(&[(99.5, 10.0), (90.0, 50.0)], &[(100.5, 20.0), (110.0, 40.0)]),
            &[],
        );
        assert!((map.depth - 30.0).abs() < 1e-9);
        assert!(map.depth >= 0.0);
    }

    #[test]
    fn flow_rate_attributes_nearby_prints() {
        let mapper = LiquidityMapper::new();
        let prints = vec![
            print_at(99.51, 5.0), // within 0.1% of 99.5
            print_at(101.0, 7.0), // not near 99.5
        ];
        let map = mapper.map(&book(&[(99.5, 10.0)], &[(101.0, 10.0)]), &prints);
        let bid_level = map.levels.iter().find(|l| l.side == BookSide::Bid).unwrap();
        assert!((bid_level.flow_rate - 5.0).abs() < 1e-9);
        let ask_level = map.levels.iter().find(|l| l.side == BookSide::Ask).unwrap();
        assert!((ask_level.flow_rate - 7.0).abs() < 1e-9);
    }

    #[test]
    fn absorption_uses_recent_prints_over_book_volume() {
        let mapper = LiquidityMapper::new();
        let prints: Vec<Print> = (0..150).map(|_| print_at(100.0, 1.0)).collect();
        let map = mapper.map(&book(&[(99.0, 100.0)], &[(101.0, 100.0)]), &prints);
        // last 100 prints of size 1 over 200 resting
        assert!((map.absorption_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn persistence_is_share_of_side_volume() {
        let mapper = LiquidityMapper::new();
        let map = mapper.map(&book(&[(99.0, 30.0), (98.0, 10.0)], &[]), &[]);
        let top = map.levels.iter().find(|l| l.price == 99.0).unwrap();
        assert!((top.persistence - 0.75).abs() < 1e-9);
    }
}
