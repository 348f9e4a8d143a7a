//! Open position and completed round trips for a single long-only asset.

use chrono::NaiveDate;

/// A long holding. `quantity` is always positive while the position exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_index: usize,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price
    }

    /// Close the position and produce the matching trade record.
    pub fn close(self, exit_price: f64, exit_date: NaiveDate, exit_index: usize) -> TradeRecord {
        TradeRecord {
            entry_index: self.entry_index,
            exit_index,
            entry_date: self.entry_date,
            exit_date,
            quantity: self.quantity,
            entry_price: self.entry_price,
            exit_price,
            pnl: self.unrealized_pnl(exit_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
}

impl TradeRecord {
    /// Return on the capital committed to the trade, in percent.
    pub fn return_pct(&self) -> f64 {
        let cost = self.quantity * self.entry_price;
        if cost > 0.0 {
            self.pnl / cost * 100.0
        } else {
            0.0
        }
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index - self.entry_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            quantity: 100.0,
            entry_price: 50.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_index: 3,
        }
    }

    #[test]
    fn market_value_and_cost() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.cost_basis() - 5000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_profit_and_loss() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn close_produces_trade() {
        let exit_date = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let trade = sample_position().close(56.0, exit_date, 8);

        assert_eq!(trade.entry_index, 3);
        assert_eq!(trade.exit_index, 8);
        assert_eq!(trade.exit_date, exit_date);
        assert_eq!(trade.bars_held(), 5);
        assert!((trade.pnl - 600.0).abs() < 1e-9);
        assert!((trade.return_pct() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_quantity() {
        let pos = Position {
            quantity: 2.5,
            ..sample_position()
        };
        assert!((pos.market_value(10.0) - 25.0).abs() < f64::EPSILON);
    }
}
