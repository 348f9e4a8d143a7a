//! Performance statistics for a completed run.

use super::portfolio::EquityPoint;
use super::position::{Position, TradeRecord};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary of one backtest. Loss figures carry their sign: `gross_loss` and
/// `largest_loss` are `<= 0`, so `net_pnl == gross_profit + gross_loss`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub final_value: f64,
    pub total_return_pct: f64,
    /// `None` with fewer than two returns or a flat equity curve.
    pub sharpe_ratio: Option<f64>,
    /// Largest peak-to-trough decline in percent, `<= 0`.
    pub max_drawdown_pct: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate_pct: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_pnl: f64,
    pub avg_trade_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub open_trades: usize,
}

impl Statistics {
    /// `open_position` is whatever the run still holds after the last bar.
    pub fn compute(
        trades: &[TradeRecord],
        open_position: Option<&Position>,
        equity_curve: &[EquityPoint],
        initial_cash: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_value = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_cash);

        let total_return_pct = if initial_cash > 0.0 {
            (final_value - initial_cash) / initial_cash * 100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let sharpe_ratio = compute_sharpe(equity_curve, risk_free_rate / TRADING_DAYS_PER_YEAR);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                gross_loss += pnl;
                largest_loss = largest_loss.min(pnl);
            }
        }

        let total_trades = trades.len();
        // won / max(total, 1)
        let win_rate_pct = trades_won as f64 / total_trades.max(1) as f64 * 100.0;
        let net_pnl = gross_profit + gross_loss;
        let avg_trade_pnl = if total_trades > 0 {
            net_pnl / total_trades as f64
        } else {
            0.0
        };

        Statistics {
            final_value,
            total_return_pct,
            sharpe_ratio,
            max_drawdown_pct: 0.0 - max_drawdown * 100.0,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            win_rate_pct,
            gross_profit,
            gross_loss,
            net_pnl,
            avg_trade_pnl,
            largest_win,
            largest_loss,
            open_trades: usize::from(open_position.is_some()),
        }
    }

    pub fn sharpe_display(&self) -> String {
        match self.sharpe_ratio {
            Some(sharpe) => format!("{:.2}", sharpe),
            None => "N/A".to_string(),
        }
    }
}

/// Largest drawdown as a fraction of the peak, and its longest duration in bars.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut run = 0usize;
    let mut longest = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            run = 0;
            continue;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
        run += 1;
        longest = longest.max(run);
    }

    (max_dd, longest)
}

fn compute_sharpe(equity_curve: &[EquityPoint], daily_rf: f64) -> Option<f64> {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let (prev, curr) = (w[0].equity, w[1].equity);
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        let sharpe = (mean - daily_rf) / stddev * TRADING_DAYS_PER_YEAR.sqrt();
        sharpe.is_finite().then_some(sharpe)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_trade(pnl: f64) -> TradeRecord {
        let entry_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        TradeRecord {
            entry_index: 0,
            exit_index: 5,
            entry_date,
            exit_date: entry_date + chrono::Duration::days(5),
            quantity: 10.0,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            pnl,
        }
    }

    #[test]
    fn empty_run() {
        let stats = Statistics::compute(&[], None, &[], 10_000.0, 0.0);
        assert_eq!(stats.final_value, 10_000.0);
        assert_eq!(stats.total_return_pct, 0.0);
        assert_eq!(stats.sharpe_ratio, None);
        assert_eq!(stats.max_drawdown_pct, 0.0);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.win_rate_pct, 0.0);
        assert_eq!(stats.sharpe_display(), "N/A");
        assert_eq!(stats.open_trades, 0);
    }

    #[test]
    fn held_position_counts_as_open_trade() {
        let position = Position {
            quantity: 10.0,
            entry_price: 100.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            entry_index: 2,
        };
        let curve = make_equity_curve(&[1_000.0, 1_000.0, 1_000.0, 1_020.0]);
        let stats = Statistics::compute(&[make_trade(50.0)], Some(&position), &curve, 1_000.0, 0.0);

        assert_eq!(stats.open_trades, 1);
        assert_eq!(stats.total_trades, 1);
    }

    #[test]
    fn total_return_and_final_value() {
        let curve = make_equity_curve(&[1_000.0, 1_050.0, 1_100.0]);
        let stats = Statistics::compute(&[], None, &curve, 1_000.0, 0.0);
        assert_relative_eq!(stats.final_value, 1_100.0);
        assert_relative_eq!(stats.total_return_pct, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn trade_breakdown() {
        let trades = vec![
            make_trade(100.0),
            make_trade(-50.0),
            make_trade(200.0),
            make_trade(0.0),
            make_trade(-150.0),
        ];
        let curve = make_equity_curve(&[1_000.0, 1_100.0]);
        let stats = Statistics::compute(&trades, None, &curve, 1_000.0, 0.0);

        assert_eq!(stats.total_trades, 5);
        assert_eq!(stats.trades_won, 2);
        assert_eq!(stats.trades_lost, 2);
        assert_relative_eq!(stats.win_rate_pct, 40.0);
        assert_relative_eq!(stats.gross_profit, 300.0);
        assert_relative_eq!(stats.gross_loss, -200.0);
        assert_relative_eq!(stats.net_pnl, 100.0);
        assert_relative_eq!(stats.avg_trade_pnl, 20.0);
        assert_relative_eq!(stats.largest_win, 200.0);
        assert_relative_eq!(stats.largest_loss, -150.0);
    }

    #[test]
    fn max_drawdown_is_negative_percent() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let stats = Statistics::compute(&[], None, &curve, 100.0, 0.0);
        assert_relative_eq!(
            stats.max_drawdown_pct,
            -(110.0 - 80.0) / 110.0 * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn max_drawdown_duration_counts_bars_below_peak() {
        let curve = make_equity_curve(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0, 120.0, 119.0]);
        let (_, duration) = compute_drawdown(&curve);
        assert_eq!(duration, 4);
    }

    #[test]
    fn non_decreasing_curve_has_zero_drawdown() {
        let curve = make_equity_curve(&[100.0, 100.0, 101.0, 105.0, 105.0]);
        let stats = Statistics::compute(&[], None, &curve, 100.0, 0.0);
        assert_eq!(stats.max_drawdown_pct, 0.0);
        assert!(stats.max_drawdown_pct.is_sign_positive());
        assert_eq!(stats.max_drawdown_duration, 0);
    }

    #[test]
    fn sharpe_positive_for_steady_gains() {
        let values: Vec<f64> = (0..253).map(|i| 100_000.0 * (1.0 + 0.001 * i as f64)).collect();
        let curve = make_equity_curve(&values);
        let stats = Statistics::compute(&[], None, &curve, 100_000.0, 0.0);
        assert!(stats.sharpe_ratio.unwrap() > 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        // returns: +10%, -10%
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let returns = [0.1_f64, -0.1];
        let mean = (returns[0] + returns[1]) / 2.0;
        let variance = ((returns[0] - mean).powi(2) + (returns[1] - mean).powi(2)) / 2.0;
        let expected = (mean - 0.05 / 252.0) / variance.sqrt() * 252.0_f64.sqrt();

        let sharpe = compute_sharpe(&curve, 0.05 / 252.0).unwrap();
        assert_relative_eq!(sharpe, expected, epsilon = 1e-9);
    }

    #[test]
    fn sharpe_undefined_for_flat_or_short_curves() {
        let flat = make_equity_curve(&[100.0; 10]);
        assert_eq!(compute_sharpe(&flat, 0.0), None);
        let short = make_equity_curve(&[100.0, 110.0]);
        assert_eq!(compute_sharpe(&short, 0.0), None);
    }

    proptest! {
        #[test]
        fn bounds_hold_for_any_run(
            equity in prop::collection::vec(1.0f64..1e6, 0..60),
            pnls in prop::collection::vec(-1e4f64..1e4, 0..30),
        ) {
            let curve = make_equity_curve(&equity);
            let trades: Vec<TradeRecord> = pnls.iter().map(|&p| make_trade(p)).collect();
            let stats = Statistics::compute(&trades, None, &curve, 1_000.0, 0.02);

            prop_assert!((0.0..=100.0).contains(&stats.win_rate_pct));
            prop_assert!(stats.max_drawdown_pct <= 0.0);
            prop_assert!(stats.max_drawdown_pct >= -100.0);
            prop_assert!(stats.trades_won + stats.trades_lost <= stats.total_trades);
            prop_assert!(stats.gross_loss <= 0.0 && stats.gross_profit >= 0.0);
        }
    }
}
