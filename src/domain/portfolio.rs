//! Cash, the single open position and the equity curve for one run.

use chrono::NaiveDate;

use super::position::{Position, TradeRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Shares affordable with all current cash at `price`.
    ///
    /// Whole shares unless `fractional` is set; zero when nothing is affordable.
    pub fn affordable_quantity(&self, price: f64, fractional: bool) -> f64 {
        if price <= 0.0 || self.cash <= 0.0 {
            return 0.0;
        }
        let raw = self.cash / price;
        if fractional { raw } else { raw.floor() }
    }

    /// Open a long position. Returns false when already holding or `quantity <= 0`.
    pub fn open(&mut self, quantity: f64, price: f64, date: NaiveDate, index: usize) -> bool {
        if self.position.is_some() || quantity <= 0.0 {
            return false;
        }
        self.cash -= quantity * price;
        self.position = Some(Position {
            quantity,
            entry_price: price,
            entry_date: date,
            entry_index: index,
        });
        true
    }

    /// Close the open position, if any, returning proceeds to cash.
    pub fn close(&mut self, price: f64, date: NaiveDate, index: usize) -> Option<&TradeRecord> {
        let position = self.position.take()?;
        self.cash += position.market_value(price);
        self.trades.push(position.close(price, date, index));
        self.trades.last()
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |pos| pos.market_value(price))
    }

    pub fn record_equity(&mut self, date: NaiveDate, price: f64) {
        let equity = self.equity(price);
        self.equity_curve.push(EquityPoint { date, equity });
    }
}
