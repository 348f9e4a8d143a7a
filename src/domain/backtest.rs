//! Backtest runner: drives an evaluator bar by bar over one price series.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use super::crossover::Signal;
use super::error::CrossbtError;
use super::metrics::Statistics;
use super::ohlcv::{validate_series, PriceBar};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{Position, TradeRecord};
use super::strategy::Evaluator;

/// Price at which a signal is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    /// Close of the bar that produced the signal.
    #[default]
    SignalClose,
    /// Open of the following bar; a signal on the last bar is dropped.
    NextOpen,
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPolicy::SignalClose => write!(f, "close"),
            ExecutionPolicy::NextOpen => write!(f, "next_open"),
        }
    }
}

impl FromStr for ExecutionPolicy {
    type Err = CrossbtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close" | "signal_close" => Ok(ExecutionPolicy::SignalClose),
            "next_open" | "open" => Ok(ExecutionPolicy::NextOpen),
            other => Err(CrossbtError::invalid(format!(
                "unknown execution policy '{}' (expected close or next_open)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub execution: ExecutionPolicy,
    pub fractional_shares: bool,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: 10_000.0,
            execution: ExecutionPolicy::SignalClose,
            fractional_shares: false,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub final_value: f64,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    /// Position still held after the last bar, marked at the last close.
    pub open_position: Option<Position>,
    pub execution: ExecutionPolicy,
    pub statistics: Statistics,
}

/// Run `evaluator` over `bars`, all-in and all-out on a single long position.
pub fn run_backtest(
    bars: &[PriceBar],
    evaluator: &dyn Evaluator,
    config: &BacktestConfig,
) -> Result<BacktestResult, CrossbtError> {
    if !(config.initial_cash.is_finite() && config.initial_cash > 0.0) {
        return Err(CrossbtError::invalid(format!(
            "initial cash must be positive, got {}",
            config.initial_cash
        )));
    }
    validate_series("series", bars)?;
    let required = evaluator.lookback();
    if bars.len() < required {
        return Err(CrossbtError::InsufficientHistory {
            bars: bars.len(),
            required,
        });
    }

    let mut portfolio = Portfolio::new(config.initial_cash);
    let mut pending: Option<Signal> = None;

    for (i, bar) in bars.iter().enumerate() {
        if let Some(signal) = pending.take() {
            execute(&mut portfolio, signal, bar.open, bar, i, config);
        }

        let signal = evaluator.evaluate(&bars[..=i]);
        if signal != Signal::Hold {
            debug!(date = %bar.date, %signal, "signal");
            match config.execution {
                ExecutionPolicy::SignalClose => {
                    execute(&mut portfolio, signal, bar.close, bar, i, config)
                }
                ExecutionPolicy::NextOpen => pending = Some(signal),
            }
        }

        portfolio.record_equity(bar.date, bar.close);
    }

    if let Some(signal) = pending {
        debug!(%signal, "signal on last bar dropped");
    }

    let statistics = Statistics::compute(
        &portfolio.trades,
        portfolio.position.as_ref(),
        &portfolio.equity_curve,
        config.initial_cash,
        config.risk_free_rate,
    );

    info!(
        strategy = %evaluator.name(),
        trades = portfolio.trades.len(),
        final_value = statistics.final_value,
        "backtest complete"
    );

    Ok(BacktestResult {
        final_value: statistics.final_value,
        trades: portfolio.trades,
        equity_curve: portfolio.equity_curve,
        open_position: portfolio.position,
        execution: config.execution,
        statistics,
    })
}

fn execute(
    portfolio: &mut Portfolio,
    signal: Signal,
    price: f64,
    bar: &PriceBar,
    index: usize,
    config: &BacktestConfig,
) {
    match signal {
        Signal::Buy if portfolio.is_flat() => {
            let quantity = portfolio.affordable_quantity(price, config.fractional_shares);
            if portfolio.open(quantity, price, bar.date, index) {
                debug!(date = %bar.date, quantity, price, "opened position");
            } else {
                debug!(
                    date = %bar.date,
                    cash = portfolio.cash,
                    price,
                    "buy skipped: cannot afford one share"
                );
            }
        }
        Signal::Sell => {
            if let Some(trade) = portfolio.close(price, bar.date, index) {
                debug!(date = %bar.date, price, pnl = trade.pnl, "closed position");
            }
        }
        Signal::Buy | Signal::Hold => {}
    }
}
