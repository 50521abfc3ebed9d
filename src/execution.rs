use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::debug;

use crate::core::ring::RingBuffer;
use crate::models::features::StructuralFeatures;
use crate::models::order::{ExecutionResult, Order, OrderStatus};
use crate::models::signal::{ApprovedSignal, OrderType, Urgency};

/// Results retained for inspection.
const HISTORY_CAPACITY: usize = 1000;
/// Realized slippage observations feeding the prediction.
const SLIPPAGE_CAPACITY: usize = 100;
/// Slippage assumed before any fills have been observed.
const BASE_SLIPPAGE: f64 = 0.0005;
/// Per-fill fee rate (0.01% of notional).
const FEE_RATE: f64 = 0.0001;

/// Simulates order execution against a predictable cost model. The only
/// nondeterminism in the pipeline lives here; seed it for reproducible
/// runs.
pub struct ExecutionSimulator {
    pending: HashMap<String, Order>,
    history: RingBuffer<ExecutionResult>,
    slippage_history: RingBuffer<f64>,
    order_counter: u64,
    total_orders: u64,
    failed_orders: u64,
    rng: StdRng,
}

impl ExecutionSimulator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            pending: HashMap::new(),
            history: RingBuffer::new(HISTORY_CAPACITY),
            slippage_history: RingBuffer::new(SLIPPAGE_CAPACITY),
            order_counter: 0,
            total_orders: 0,
            failed_orders: 0,
            rng,
        }
    }

    pub fn simulate(
        &mut self,
        approved: &[ApprovedSignal],
        features: &StructuralFeatures,
    ) -> Vec<ExecutionResult> {
        approved
            .iter()
            .map(|a| self.execute(a, features))
            .collect()
    }

    /// Unsuccessful orders over total orders, for health reporting.
    pub fn error_rate(&self) -> f64 {
        if self.total_orders == 0 {
            return 0.0;
        }
        self.failed_orders as f64 / self.total_orders as f64
    }

    pub fn history(&self) -> Vec<ExecutionResult> {
        self.history.to_vec()
    }

    /// Orders still working a remainder after a partial fill.
    pub fn pending_orders(&self) -> Vec<&Order> {
        self.pending.values().collect()
    }

    fn execute(&mut self, approved: &ApprovedSignal, features: &StructuralFeatures) -> ExecutionResult {
        let signal = &approved.signal;
        self.order_counter += 1;
        self.total_orders += 1;
        let mut order = Order {
            id: format!("ord-{}", self.order_counter),
            signal_id: signal.id.clone(),
            direction: signal.direction,
            order_type: approved.constraints.order_type,
            size: approved.approved_size,
            price: signal.entry_price,
            status: OrderStatus::Pending,
            filled_size: 0.0,
            fill_price: 0.0,
            fees: 0.0,
            submitted_at: features.timestamp,
            filled_at: None,
        };

        if !(order.size > 0.0) || !order.size.is_finite() || order.price <= 0.0 {
            order.status = OrderStatus::Rejected;
            self.failed_orders += 1;
            let result = ExecutionResult {
                order,
                slippage: 0.0,
                latency_ms: 0.0,
                market_impact: 0.0,
                success: false,
                error: Some("invalid order size or price".to_string()),
            };
            self.history.push(result.clone());
            return result;
        }
        order.status = OrderStatus::Submitted;
        self.pending.insert(order.id.clone(), order.clone());

        let depth = features.liquidity.depth;
        let avg_slippage = if self.slippage_history.is_empty() {
            BASE_SLIPPAGE
        } else {
            self.slippage_history.mean()
        };
        let size_adj = 1.0 + 0.5 * order.size / (depth + 1.0);
        let vol_adj = 1.0 + features.volatility.implied / 100.0;
        let urgency_mult = match approved.constraints.urgency {
            Urgency::High => 1.5,
            Urgency::Medium => 1.2,
            Urgency::Low => 1.0,
        };
        let predicted_slippage = avg_slippage * size_adj * vol_adj * urgency_mult;

        let latency_ms = self.rng.gen_range(10.0..60.0);
        let fill_rate = self.roll_fill_rate(order.order_type, approved.constraints.urgency);

        let result = if fill_rate == 0.0 {
            order.status = OrderStatus::Cancelled;
            self.pending.remove(&order.id);
            self.failed_orders += 1;
            ExecutionResult {
                order,
                slippage: 0.0,
                latency_ms,
                market_impact: 0.0,
                success: false,
                error: Some("unfilled within simulated window".to_string()),
            }
        } else {
            let adverse = signal.direction.sign();
            let realized_slippage = predicted_slippage * (0.5 + self.rng.gen_range(0.0..1.0));
            let fill_price = signal.entry_price * (1.0 + adverse * realized_slippage);
            let filled_size = order.size * fill_rate;

            order.filled_size = filled_size;
            order.fill_price = fill_price;
            order.fees = filled_size * FEE_RATE;
            order.filled_at = Some(order.submitted_at + latency_ms as i64);
            if fill_rate >= 1.0 {
                order.status = OrderStatus::Filled;
                self.pending.remove(&order.id);
            } else {
                // Remainder keeps working
                order.status = OrderStatus::Partial;
                self.pending.insert(order.id.clone(), order.clone());
            }

            self.slippage_history.push(realized_slippage);
            let market_impact = (filled_size / 1e6).sqrt() * 1e-4
                * (1.0 + filled_size / (depth + 1.0));

            ExecutionResult {
                order,
                slippage: realized_slippage,
                latency_ms,
                market_impact,
                success: true,
                error: None,
            }
        };

        debug!(
            order = %result.order.id,
            status = %result.order.status,
            slippage = result.slippage,
            latency_ms = result.latency_ms,
            "order simulated"
        );
        self.history.push(result.clone());
        result
    }

    fn roll_fill_rate(&mut self, order_type: OrderType, urgency: Urgency) -> f64 {
        if order_type == OrderType::Market {
            return 1.0;
        }
        let roll: f64 = self.rng.gen_range(0.0..1.0);
        match urgency {
            Urgency::High => {
                if roll < 0.9 {
                    1.0
                } else {
                    0.8
                }
            }
            Urgency::Medium => {
                if roll < 0.8 {
                    1.0
                } else {
                    0.7
                }
            }
            Urgency::Low => {
                if roll < 0.6 {
                    1.0
                } else if roll < 0.8 {
                    0.5
                } else {
                    0.0
                }
            }
        }
    }
}
