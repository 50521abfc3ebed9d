use crate::core::numerics;
use crate::models::features::{VolRegime, VolatilityState};
use crate::models::market::{OptionQuote, OptionRight};

/// Trading days used to annualize realized volatility.
const ANNUALIZATION_DAYS: f64 = 252.0;

/// Derives the volatility snapshot from recent closes, the options
/// chain, and the rolling realized-vol history.
pub struct VolatilityAnalyzer;

impl VolatilityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// `realized_history` holds prior realized-vol observations (as
    /// fractions); its dispersion becomes the vol-of-vol.
    pub fn analyze(
        &self,
        closes: &[f64],
        chain: &[OptionQuote],
        realized_history: &[f64],
    ) -> VolatilityState {
        let rets = numerics::log_returns(closes);
        let historical = numerics::std_dev(&rets) * ANNUALIZATION_DAYS.sqrt() * 100.0;

        let ivs: Vec<f64> = chain
            .iter()
            .map(|q| q.implied_vol)
            .filter(|&iv| iv > 0.0 && iv.is_finite())
            .collect();
        let implied = if ivs.is_empty() {
            historical
        } else {
            numerics::mean(&ivs) * 100.0
        };

        let spread = implied - historical;
        let vol_of_vol = numerics::std_dev(realized_history);
        let skew = self.skew(chain);
        let term_structure = self.term_structure(chain);

        let regime = Self::regime_for(implied);

        VolatilityState {
            regime,
            historical,
            implied,
            spread,
            vol_of_vol,
            skew,
            term_structure,
        }
    }

    pub fn regime_for(implied_pct: f64) -> VolRegime {
        if implied_pct < 15.0 {
            VolRegime::Low
        } else if implied_pct < 25.0 {
            VolRegime::Normal
        } else if implied_pct < 35.0 {
            VolRegime::Elevated
        } else if implied_pct < 50.0 {
            VolRegime::High
        } else {
            VolRegime::Extreme
        }
    }

    /// OTM-put IV (|delta| < 0.25) minus ATM IV (0.4 < |delta| < 0.6),
    /// in vol points.
    fn skew(&self, chain: &[OptionQuote]) -> f64 {
        let otm_put: Vec<f64> = chain
            .iter()
            .filter(|q| q.right == OptionRight::Put && q.delta.abs() < 0.25 && q.implied_vol > 0.0)
            .map(|q| q.implied_vol)
            .collect();
        let atm: Vec<f64> = chain
            .iter()
            .filter(|q| {
                let d = q.delta.abs();
                d > 0.4 && d < 0.6 && q.implied_vol > 0.0
            })
            .map(|q| q.implied_vol)
            .collect();
        if otm_put.is_empty() || atm.is_empty() {
            return 0.0;
        }
        (numerics::mean(&otm_put) - numerics::mean(&atm)) * 100.0
    }

    /// Far-expiry IV minus nearest-expiry IV, in vol points.
    fn term_structure(&self, chain: &[OptionQuote]) -> f64 {
        let mut expiries: Vec<i64> = chain
            .iter()
            .filter(|q| q.implied_vol > 0.0)
            .map(|q| q.expiry)
            .collect();
        expiries.sort_unstable();
        expiries.dedup();
        if expiries.len() < 2 {
            return 0.0;
        }
        let near = *expiries.first().unwrap();
        let far = *expiries.last().unwrap();

        let mean_iv_at = |expiry: i64| {
            let ivs: Vec<f64> = chain
                .iter()
                .filter(|q| q.expiry == expiry && q.implied_vol > 0.0)
                .map(|q| q.implied_vol)
                .collect();
            numerics::mean(&ivs)
        };
        (mean_iv_at(far) - mean_iv_at(near)) * 100.0
    }
}
