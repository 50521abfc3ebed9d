use serde::{Deserialize, Serialize};

use crate::models::direction::Direction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    /// Size in instrument units.
    pub size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub opened_at: i64,
}

impl Position {
    pub fn notional(&self) -> f64 {
        self.size * self.current_price
    }

    /// Re-mark the position at a new price.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = self.direction.sign() * (price - self.entry_price) * self.size;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub positions: Vec<Position>,
    pub margin_used: f64,
    pub margin_available: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub daily_pnl: f64,
    pub total_value: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            positions: Vec::new(),
            margin_used: 0.0,
            margin_available: initial_cash,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            daily_pnl: 0.0,
            total_value: initial_cash,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
        }
    }

    /// Re-mark all positions and refresh the derived fields.
    pub fn revalue(&mut self, price: f64) {
        for pos in &mut self.positions {
            pos.mark(price);
        }
        self.unrealized_pnl = self.positions.iter().map(|p| p.unrealized_pnl).sum();
        self.total_value = self.cash
            + self
                .positions
                .iter()
                .map(|p| p.size * p.current_price)
                .sum::<f64>();
        self.margin_available = (self.total_value - self.margin_used).max(0.0);
    }

    /// Largest single-position share of total value, in [0, 1].
    pub fn max_concentration(&self) -> f64 {
        if self.total_value <= 0.0 {
            return 0.0;
        }
        self.positions
            .iter()
            .map(|p| p.notional().abs() / self.total_value)
            .fold(0.0, f64::max)
    }

    /// Total notional of open positions matching `direction`.
    pub fn directional_notional(&self, direction: Direction) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.direction == direction)
            .map(|p| p.notional().abs())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_position(direction: Direction, size: f64, entry: f64) -> Position {
        Position {
            id: "pos-1".to_string(),
            symbol: "TEST".to_string(),
            direction,
            size,
            entry_price: entry,
            current_price: entry,
            unrealized_pnl: 0.0,
            opened_at: 0,
        }
    }

    #[test]
    fn revalue_marks_positions_and_totals() {
        let mut pf = Portfolio::new(100_000.0);
        pf.cash = 90_000.0;
        pf.positions.push(open_position(Direction::Long, 100.0, 100.0));
        pf.revalue(105.0);

        assert!((pf.unrealized_pnl - 500.0).abs() < 1e-9);
        assert!((pf.total_value - (90_000.0 + 10_500.0)).abs() < 1e-9);
    }

    #[test]
    fn short_position_gains_on_decline() {
        let mut pos = open_position(Direction::Short, 10.0, 100.0);
        pos.mark(95.0);
        assert!((pos.unrealized_pnl - 50.0).abs() < 1e-9);
    }

    #[test]
    fn concentration_uses_largest_position() {
        let mut pf = Portfolio::new(100_000.0);
        pf.cash = 70_000.0;
        pf.positions.push(open_position(Direction::Long, 100.0, 100.0));
        pf.positions.push(open_position(Direction::Long, 200.0, 100.0));
        pf.revalue(100.0);

        // total = 70k + 10k + 20k = 100k; largest position 20k
        assert!((pf.max_concentration() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn directional_notional_filters_by_side() {
        let mut pf = Portfolio::new(100_000.0);
        pf.positions.push(open_position(Direction::Long, 100.0, 100.0));
        pf.positions.push(open_position(Direction::Short, 50.0, 100.0));
        pf.revalue(100.0);

        assert!((pf.directional_notional(Direction::Long) - 10_000.0).abs() < 1e-9);
        assert!((pf.directional_notional(Direction::Short) - 5_000.0).abs() < 1e-9);
    }
}
