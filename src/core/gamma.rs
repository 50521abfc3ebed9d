use crate::models::features::{
    Attractor, AttractorKind, FlipDirection, GammaFlip, GammaSurface, GravitationalPull,
};
use crate::models::market::OptionQuote;

/// Fraction of the surface's gamma range a cell must exceed to count as
/// an attractor.
const ATTRACTOR_THRESHOLD: f64 = 0.10;
/// Attractors kept on the pull vector.
const MAX_ATTRACTORS: usize = 10;
/// Contract multiplier applied to per-option gamma.
const CONTRACT_SIZE: f64 = 100.0;

/// Aggregates an options chain into a gamma surface and derives the
/// flip and attractor structure from it.
pub struct GammaAnalyzer;

impl GammaAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Sum gamma * openInterest * 100 into a dense [expiry][strike]
    /// matrix over the unique sorted strikes and expiries of the chain.
    pub fn build_surface(&self, chain: &[OptionQuote]) -> GammaSurface {
        if chain.is_empty() {
            return GammaSurface::default();
        }

        let mut strikes: Vec<f64> = chain.iter().map(|q| q.strike).collect();
        strikes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        strikes.dedup();

        let mut expiries: Vec<i64> = chain.iter().map(|q| q.expiry).collect();
        expiries.sort_unstable();
        expiries.dedup();

        let mut values = vec![vec![0.0; strikes.len()]; expiries.len()];
        for quote in chain {
            let si = match strikes.iter().position(|&s| s == quote.strike) {
                Some(i) => i,
                None => continue,
            };
            let ei = match expiries.iter().position(|&e| e == quote.expiry) {
                Some(i) => i,
                None => continue,
            };
            let exposure = quote.gamma * quote.open_interest * CONTRACT_SIZE;
            if exposure.is_finite() {
                values[ei][si] += exposure;
            }
        }

        // Zero-anchored extremes: a one-sided surface still has a usable
        // range for the attractor threshold
        let mut min_gamma = 0.0f64;
        let mut max_gamma = 0.0f64;
        let mut net_gamma = 0.0;
        for row in &values {
            for &v in row {
                min_gamma = min_gamma.min(v);
                max_gamma = max_gamma.max(v);
                net_gamma += v;
            }
        }

        GammaSurface {
            strikes,
            expiries,
            values,
            min_gamma,
            max_gamma,
            net_gamma,
        }
    }

    /// Zero-crossings per expiry row: adjacent cells with opposite signs
    /// produce a flip at the midpoint strike. Strongest first.
    pub fn find_flips(&self, surface: &GammaSurface) -> Vec<GammaFlip> {
        let mut flips = Vec::new();
        for (ei, row) in surface.values.iter().enumerate() {
            for si in 0..row.len().saturating_sub(1) {
                let (a, b) = (row[si], row[si + 1]);
                if a * b < 0.0 {
                    flips.push(GammaFlip {
                        price: (surface.strikes[si] + surface.strikes[si + 1]) / 2.0,
                        strength: (b - a).abs(),
                        direction: if a > 0.0 {
                            FlipDirection::PositiveToNegative
                        } else {
                            FlipDirection::NegativeToPositive
                        },
                        expiry: surface.expiries[ei],
                    });
                }
            }
        }
        flips.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        flips
    }

    /// Inverse-square attraction of price toward large-gamma strikes.
    /// Cells above 10% of the surface range become attractors; the ten
    /// strongest are kept.
    pub fn gravitational_pull(&self, surface: &GammaSurface, spot: f64) -> GravitationalPull {
        let range = surface.range();
        if surface.is_empty() || range == 0.0 {
            return GravitationalPull::default();
        }
        let threshold = range * ATTRACTOR_THRESHOLD;

        let mut attractors: Vec<Attractor> = Vec::new();
        for row in &surface.values {
            for (si, &v) in row.iter().enumerate() {
                if v.abs() > threshold {
                    attractors.push(Attractor {
                        price: surface.strikes[si],
                        strength: v,
                        kind: AttractorKind::GammaMax,
                    });
                }
            }
        }

        let mut signed_sum = 0.0;
        let mut abs_sum = 0.0;
        for a in &attractors {
            let distance = a.price - spot;
            if distance == 0.0 {
                continue;
            }
            let pull = a.strength.abs() / (distance * distance);
            signed_sum += pull * distance.signum();
            abs_sum += pull;
        }

        let direction = if signed_sum > 0.0 {
            1
        } else if signed_sum < 0.0 {
            -1
        } else {
            0
        };
        let magnitude = if abs_sum == 0.0 {
            0.0
        } else {
            (signed_sum.abs() / abs_sum).min(1.0)
        };

        attractors.sort_by(|a, b| {
            b.strength
                .abs()
                .partial_cmp(&a.strength.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        attractors.truncate(MAX_ATTRACTORS);

        GravitationalPull {
            direction,
            magnitude,
            attractors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::market::OptionRight;

    fn quote(strike: f64, expiry: i64, gamma: f64, oi: f64) -> OptionQuote {
        OptionQuote {
            strike,
            expiry,
            right: OptionRight::Call,
            bid: 1.0,
            ask: 1.2,
            last: 1.1,
            volume: 10.0,
            open_interest: oi,
            implied_vol: 0.2,
            delta: 0.5,
            gamma,
            theta: -0.01,
            vega: 0.1,
            rho: 0.01,
        }
    }

    #[test]
    fn surface_dimensions_match_strike_expiry_cross() {
        let chain = vec![
            quote(100.0, 1_000, 0.01, 100.0),
            quote(105.0, 1_000, 0.02, 50.0),
            quote(100.0, 2_000, 0.03, 10.0),
        ];
        let surface = GammaAnalyzer::new().build_surface(&chain);
        assert_eq!(surface.strikes, vec![100.0, 105.0]);
        assert_eq!(surface.expiries, vec![1_000, 2_000]);
        assert_eq!(surface.values.len(), 2);
        assert!(surface.values.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn surface_aggregates_gamma_oi_contract() {
        let chain = vec![
            quote(100.0, 1_000, 0.01, 100.0),
            quote(100.0, 1_000, 0.02, 100.0), // same cell, sums
        ];
        let surface = GammaAnalyzer::new().build_surface(&chain);
        // (0.01 + 0.02) * 100 * 100 = 300
        assert!((surface.values[0][0] - 300.0).abs() < 1e-9);
        assert!((surface.net_gamma - 300.0).abs() < 1e-9);
        assert!((surface.max_gamma - 300.0).abs() < 1e-9);
    }

    #[test]
    fn net_equals_cell_sum_and_bounds_hold() {
        let chain = vec![
            quote(95.0, 1_000, 0.01, 10.0),
            quote(100.0, 1_000, -0.02, 20.0),
            quote(105.0, 2_000, 0.005, 30.0),
        ];
        let surface = GammaAnalyzer::new().build_surface(&chain);
        let cell_sum: f64 = surface.values.iter().flatten().sum();
        assert!((surface.net_gamma - cell_sum).abs() < 1e-9);
        for &v in surface.values.iter().flatten() {
            assert!(surface.max_gamma >= v);
            assert!(surface.min_gamma <= v);
        }
    }

    #[test]
    fn flip_detected_at_midpoint_with_sign_change() {
        let chain = vec![
            quote(100.0, 1_000, 0.01, 100.0),  // +100
            quote(110.0, 1_000, -0.02, 100.0), // -200
        ];
        let analyzer = GammaAnalyzer::new();
        let surface = analyzer.build_surface(&chain);
        let flips = analyzer.find_flips(&surface);
        assert_eq!(flips.len(), 1);
        let flip = &flips[0];
        assert!((flip.price - 105.0).abs() < 1e-9);
        assert!(flip.price > 100.0 && flip.price < 110.0);
        assert!((flip.strength - 300.0).abs() < 1e-9);
        assert_eq!(flip.direction, FlipDirection::PositiveToNegative);
    }

    #[test]
    fn flips_sorted_by_strength_descending() {
        let chain = vec![
            quote(100.0, 1_000, 0.01, 100.0),
            quote(105.0, 1_000, -0.001, 100.0),
            quote(110.0, 1_000, 0.05, 100.0),
        ];
        let analyzer = GammaAnalyzer::new();
        let surface = analyzer.build_surface(&chain);
        let flips = analyzer.find_flips(&surface);
        assert_eq!(flips.len(), 2);
        assert!(flips[0].strength >= flips[1].strength);
    }

    #[test]
    fn pull_magnitude_and_direction_bounds() {
        let chain = vec![
            quote(105.0, 1_000, 0.05, 1_000.0),
            quote(95.0, 1_000, 0.01, 100.0),
        ];
        let analyzer = GammaAnalyzer::new();
        let surface = analyzer.build_surface(&chain);
        let pull = analyzer.gravitational_pull(&surface, 100.0);
        assert!(pull.magnitude >= 0.0 && pull.magnitude <= 1.0);
        assert!(pull.direction == -1 || pull.direction == 0 || pull.direction == 1);
        // Dominant mass above spot pulls up
        assert_eq!(pull.direction, 1);
        assert!(pull.attractors.len() <= 10);
    }

    #[test]
    fn attractor_count_capped_at_ten() {
        let chain: Vec<OptionQuote> = (0..20)
            .map(|i| quote(90.0 + i as f64, 1_000, 0.02 + i as f64 * 0.005, 1_000.0))
            .collect();
        let analyzer = GammaAnalyzer::new();
        let surface = analyzer.build_surface(&chain);
        let pull = analyzer.gravitational_pull(&surface, 70.0);
        assert!(pull.attractors.len() <= 10);
    }

    #[test]
    fn empty_chain_yields_defaults() {
        let analyzer = GammaAnalyzer::new();
        let surface = analyzer.build_surface(&[]);
        assert!(surface.is_empty());
        assert_eq!(surface.net_gamma, 0.0);
        assert!(analyzer.find_flips(&surface).is_empty());
        let pull = analyzer.gravitational_pull(&surface, 100.0);
        assert_eq!(pull.direction, 0);
        assert_eq!(pull.magnitude, 0.0);
    }
}
