use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::numerics::{clamp, kelly};
use crate::models::features::{StructuralFeatures, VolRegime};
use crate::models::portfolio::Portfolio;
use crate::models::signal::{
    ApprovedSignal, ExecutionConstraints, OrderType, RiskMetrics, Signal, TimeInForce, Urgency,
};

/// Kelly fraction ceiling applied before halving.
const KELLY_CAP: f64 = 0.25;
/// Fraction of total value that must remain as free margin.
const MIN_FREE_MARGIN: f64 = 0.10;
/// Notional-to-margin ratio.
const MARGIN_RATE: f64 = 0.5;
/// Gamma exposure tolerated, as a fraction of total value.
const GAMMA_EXPOSURE_LIMIT: f64 = 0.01;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_position_size: f64,
    pub max_portfolio_risk: f64,
    pub max_correlation: f64,
    pub max_drawdown: f64,
    pub max_daily_loss: f64,
    pub max_concentration: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 0.10,
            max_portfolio_risk: 0.02,
            max_correlation: 0.7,
            max_drawdown: 0.15,
            max_daily_loss: 0.05,
            max_concentration: 0.30,
        }
    }
}

/// Gates signals against the portfolio and the configured limits. The
/// kill switch is sticky: once tripped it suppresses every approval
/// until explicitly cleared.
pub struct RiskGovernor {
    limits: RiskLimits,
    kill_switch: Option<String>,
    peak_equity: f64,
}

impl RiskGovernor {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            kill_switch: None,
            peak_equity: 0.0,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn kill_switch_active(&self) -> bool {
        self.kill_switch.is_some()
    }

    pub fn kill_switch_reason(&self) -> Option<&str> {
        self.kill_switch.as_deref()
    }

    pub fn activate_kill_switch(&mut self, reason: &str) {
        if self.kill_switch.is_none() {
            warn!(reason, "kill switch ACTIVATED");
            self.kill_switch = Some(reason.to_string());
        }
    }

    /// Explicit operator reset; clears any reason.
    pub fn deactivate_kill_switch(&mut self) {
        if self.kill_switch.take().is_some() {
            info!("kill switch deactivated");
        }
    }

    /// Start a new risk day. Only a daily-loss trip may be cleared this
    /// way; a drawdown trip stays armed.
    pub fn reset_daily_risk(&mut self) {
        if let Some(reason) = &self.kill_switch {
            if reason.contains("daily loss") {
                info!("daily risk reset clears kill switch");
                self.kill_switch = None;
            }
        }
    }

    /// Track peak equity and arm the kill switch on a drawdown or daily
    /// loss breach.
    pub fn update_risk_state(&mut self, portfolio: &Portfolio) {
        self.peak_equity = self.peak_equity.max(portfolio.total_value);
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - portfolio.total_value) / self.peak_equity;
            if drawdown > self.limits.max_drawdown {
                self.activate_kill_switch(&format!(
                    "drawdown limit breached: {:.1}% from peak {:.0}",
                    drawdown * 100.0,
                    self.peak_equity
                ));
            }
        }
        if portfolio.daily_pnl.abs() > self.limits.max_daily_loss * portfolio.total_value {
            self.activate_kill_switch(&format!(
                "daily loss limit breached: {:.0} against {:.0}",
                portfolio.daily_pnl, portfolio.total_value
            ));
        }
    }

    /// The per-tick approval pipeline.
    pub fn filter(
        &mut self,
        signals: &[Signal],
        portfolio: &Portfolio,
        features: &StructuralFeatures,
    ) -> Vec<ApprovedSignal> {
        self.update_risk_state(portfolio);
        if self.kill_switch.is_some() {
            return Vec::new();
        }

        let total = portfolio.total_value;
        if total <= 0.0 {
            return Vec::new();
        }
        if portfolio.margin_available < MIN_FREE_MARGIN * total {
            warn!(
                margin_available = portfolio.margin_available,
                "insufficient free margin; no approvals this tick"
            );
            return Vec::new();
        }
        if portfolio.max_concentration() > self.limits.max_concentration {
            warn!("position concentration above limit; no approvals this tick");
            return Vec::new();
        }

        let mut approved: Vec<ApprovedSignal> = signals
            .iter()
            .filter_map(|s| self.evaluate(s, portfolio, features))
            .collect();

        // Cheapest risk first, then spend the VaR and margin budgets
        approved.sort_by(|a, b| {
            a.risk_score
                .partial_cmp(&b.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut var_budget = 0.0;
        let mut margin_budget = 0.0;
        let mut accepted = Vec::new();
        for candidate in approved {
            if var_budget + candidate.risk.var_contribution > self.limits.max_portfolio_risk {
                continue;
            }
            if margin_budget + candidate.risk.margin_required > portfolio.margin_available {
                continue;
            }
            var_budget += candidate.risk.var_contribution;
            margin_budget += candidate.risk.margin_required;
            accepted.push(candidate);
        }
        accepted
    }

    fn evaluate(
        &self,
        signal: &Signal,
        portfolio: &Portfolio,
        features: &StructuralFeatures,
    ) -> Option<ApprovedSignal> {
        let total = portfolio.total_value;
        let entry = signal.entry_price;
        let stop_distance = (entry - signal.stop_price).abs();
        if entry <= 0.0 || stop_distance == 0.0 {
            return None;
        }

        let target = signal.targets.first().copied().unwrap_or(entry);
        let payoff = (target - entry).abs() / stop_distance;
        let kelly_fraction = clamp(kelly(signal.confidence, payoff), 0.0, KELLY_CAP);
        let vol_multiplier = features.volatility.regime.adaptation_multiplier();

        let approved_size = (total * 0.5 * kelly_fraction * vol_multiplier)
            .min(self.limits.max_position_size * total)
            .min(portfolio.margin_available / MARGIN_RATE);
        if approved_size <= 0.0 {
            return None;
        }

        let correlation = portfolio.directional_notional(signal.direction) / total;
        let gamma_exposure = signal.context.gamma_level * 0.01;
        let max_loss = stop_distance / entry;
        let risk = RiskMetrics {
            correlation,
            gamma_exposure,
            var_contribution: max_loss * signal.confidence,
            max_loss,
            margin_required: approved_size * MARGIN_RATE,
        };

        if risk.correlation > self.limits.max_correlation {
            return None;
        }
        if risk.gamma_exposure.abs() > GAMMA_EXPOSURE_LIMIT * total {
            return None;
        }

        let constraints = self.constraints(signal, features);
        let risk_score = self.risk_score(&risk, features, total);

        Some(ApprovedSignal {
            signal: signal.clone(),
            approved_size,
            risk,
            constraints,
            risk_score,
        })
    }

    fn constraints(&self, signal: &Signal, features: &StructuralFeatures) -> ExecutionConstraints {
        let vol = features.volatility.regime;
        let urgency = if signal.strength > 0.7 || vol == VolRegime::High || vol == VolRegime::Extreme
        {
            Urgency::High
        } else if signal.strength < 0.4 {
            Urgency::Low
        } else {
            Urgency::Medium
        };

        let depth = features.liquidity.depth;
        ExecutionConstraints {
            max_slippage: 0.001
                * (1.0 + features.volatility.implied / 100.0 + 1.0 / (depth + 1.0)),
            urgency,
            order_type: if urgency == Urgency::High {
                OrderType::Market
            } else {
                OrderType::Limit
            },
            iceberg_ratio: if signal.strength > 0.7 { 0.2 } else { 0.5 },
            time_in_force: if urgency == Urgency::High {
                TimeInForce::Ioc
            } else {
                TimeInForce::Day
            },
        }
    }

    fn risk_score(&self, risk: &RiskMetrics, features: &StructuralFeatures, total: f64) -> f64 {
        let vol_penalty = match features.volatility.regime {
            VolRegime::Low => 0.0,
            VolRegime::Normal => 0.25,
            VolRegime::Elevated => 0.5,
            VolRegime::High => 0.75,
            VolRegime::Extreme => 1.0,
        };
        clamp(
            0.3 * clamp(risk.correlation / self.limits.max_correlation, 0.0, 1.0)
                + 0.3 * clamp(
                    risk.gamma_exposure.abs() / (GAMMA_EXPOSURE_LIMIT * total),
                    0.0,
                    1.0,
                )
                + 0.2 * clamp(risk.var_contribution / self.limits.max_portfolio_risk, 0.0, 1.0)
                + 0.2 * vol_penalty,
            0.0,
            1.0,
        )
    }
}
