use crate::core::numerics::clamp;
use crate::models::direction::FlowDirection;
use crate::models::features::{DealerPositioning, GammaSurface};
use crate::models::market::{OptionQuote, OptionRight};

/// Put/call volume ratio bounds for the flow-direction call.
const PCR_BUYING: f64 = 0.7;
const PCR_SELLING: f64 = 1.3;
/// Open interest at which the estimate reaches full confidence.
const FULL_CONFIDENCE_OI: f64 = 100_000.0;
const CONTRACT_SIZE: f64 = 100.0;

/// Infers dealer book positioning from the chain and the aggregated
/// gamma surface. Dealers are assumed short what retail is long.
pub struct DealerAnalyzer;

impl DealerAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, chain: &[OptionQuote], surface: &GammaSurface) -> DealerPositioning {
        if chain.is_empty() {
            return DealerPositioning::default();
        }

        let net_gamma_exposure = surface.net_gamma;
        let net_delta_exposure: f64 = -chain
            .iter()
            .map(|q| q.delta * q.open_interest * CONTRACT_SIZE)
            .filter(|x| x.is_finite())
            .sum::<f64>();
        let hedging_pressure = -net_gamma_exposure * 0.01;

        let put_volume: f64 = chain
            .iter()
            .filter(|q| q.right == OptionRight::Put)
            .map(|q| q.volume)
            .sum();
        let call_volume: f64 = chain
            .iter()
            .filter(|q| q.right == OptionRight::Call)
            .map(|q| q.volume)
            .sum();

        let flow_direction = if call_volume == 0.0 {
            if put_volume > 0.0 {
                FlowDirection::Selling
            } else {
                FlowDirection::Neutral
            }
        } else {
            let pcr = put_volume / call_volume;
            if pcr < PCR_BUYING {
                FlowDirection::Buying
            } else if pcr > PCR_SELLING {
                FlowDirection::Selling
            } else {
                FlowDirection::Neutral
            }
        };

        let total_oi: f64 = chain.iter().map(|q| q.open_interest).sum();
        let confidence = clamp(total_oi / FULL_CONFIDENCE_OI, 0.0, 1.0);

        DealerPositioning {
            net_gamma_exposure,
            net_delta_exposure,
            hedging_pressure,
            flow_direction,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gamma::GammaAnalyzer;

    fn quote(right: OptionRight, delta: f64, volume: f64, oi: f64) -> OptionQuote {
        OptionQuote {
            strike: 100.0,
            expiry: 1_000,
            right,
            bid: 1.0,
            ask: 1.2,
            last: 1.1,
            volume,
            open_interest: oi,
            implied_vol: 0.2,
            delta,
            gamma: 0.01,
            theta: -0.01,
            vega: 0.1,
            rho: 0.01,
        }
    }

    #[test]
    fn delta_exposure_is_negated_retail_position() {
        let chain = vec![quote(OptionRight::Call, 0.5, 10.0, 100.0)];
        let surface = GammaAnalyzer::new().build_surface(&chain);
        let dealer = DealerAnalyzer::new().analyze(&chain, &surface);
        // -(0.5 * 100 * 100) = -5000
        assert!((dealer.net_delta_exposure + 5_000.0).abs() < 1e-9);
    }

    #[test]
    fn hedging_pressure_opposes_net_gamma() {
        let chain = vec![quote(OptionRight::Call, 0.5, 10.0, 100.0)];
        let surface = GammaAnalyzer::new().build_surface(&chain);
        let dealer = DealerAnalyzer::new().analyze(&chain, &surface);
        assert!((dealer.hedging_pressure + surface.net_gamma * 0.01).abs() < 1e-9);
    }

    #[test]
    fn put_call_ratio_drives_flow_direction() {
        let analyzer = DealerAnalyzer::new();
        let surface = GammaSurface::default();

        let buying = vec![
            quote(OptionRight::Call, 0.5, 100.0, 10.0),
            quote(OptionRight::Put, -0.5, 50.0, 10.0),
        ];
        assert_eq!(
            analyzer.analyze(&buying, &surface).flow_direction,
            FlowDirection::Buying
        );

        let selling = vec![
            quote(OptionRight::Call, 0.5, 50.0, 10.0),
            quote(OptionRight::Put, -0.5, 100.0, 10.0),
        ];
        assert_eq!(
            analyzer.analyze(&selling, &surface).flow_direction,
            FlowDirection::Selling
        );

        let neutral = vec![
            quote(OptionRight::Call, 0.5, 100.0, 10.0),
            quote(OptionRight::Put, -0.5, 100.0, 10.0),
        ];
        assert_eq!(
            analyzer.analyze(&neutral, &surface).flow_direction,
            FlowDirection::Neutral
        );
    }

    #[test]
    fn confidence_saturates_at_one() {
        let analyzer = DealerAnalyzer::new();
        let surface = GammaSurface::default();

        let thin = vec![quote(OptionRight::Call, 0.5, 10.0, 50_000.0)];
        assert!((analyzer.analyze(&thin, &surface).confidence - 0.5).abs() < 1e-9);

        let heavy = vec![quote(OptionRight::Call, 0.5, 10.0, 500_000.0)];
        assert!((analyzer.analyze(&heavy, &surface).confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_chain_is_neutral_default() {
        let dealer = DealerAnalyzer::new().analyze(&[], &GammaSurface::default());
        assert_eq!(dealer.flow_direction, FlowDirection::Neutral);
        assert_eq!(dealer.confidence, 0.0);
        assert_eq!(dealer.net_gamma_exposure, 0.0);
    }
}
