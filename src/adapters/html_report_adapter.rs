//! HTML report adapter implementing ReportPort.
//!
//! Renders `templates/report.html` with Askama. The chart from
//! [`chart_svg`](super::chart_svg) is embedded inline.

use std::collections::BTreeMap;

use askama::Template;
use chrono::Datelike;

use super::chart_svg::{render_chart, ChartData};
use crate::domain::error::CrossbtError;
use crate::domain::portfolio::EquityPoint;
use crate::ports::report_port::{ReportContext, ReportPort};

struct MetricRow {
    label: &'static str,
    value: String,
    class: &'static str,
}

struct TradeRow {
    number: usize,
    entry_date: String,
    entry_price: String,
    exit_date: String,
    exit_price: String,
    quantity: String,
    bars_held: usize,
    pnl: String,
    return_pct: String,
    class: &'static str,
}

struct MonthlyReturnRow {
    year: i32,
    months: Vec<Option<String>>,
}

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    ticker: &'a str,
    strategy: String,
    start_date: String,
    end_date: String,
    bar_count: usize,
    initial_cash: String,
    execution: String,
    metrics: Vec<MetricRow>,
    chart_svg: String,
    trades: Vec<TradeRow>,
    open_position: Option<String>,
    monthly_returns: Vec<MonthlyReturnRow>,
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "pos"
    } else if value < 0.0 {
        "neg"
    } else {
        ""
    }
}

fn metric_rows(ctx: &ReportContext<'_>) -> Vec<MetricRow> {
    let s = &ctx.result.statistics;
    let row = |label, value: String, class| MetricRow {
        label,
        value,
        class,
    };
    vec![
        row("Final Value", format!("{:.2}", s.final_value), ""),
        row(
            "Total Return",
            format!("{:.2}%", s.total_return_pct),
            sign_class(s.total_return_pct),
        ),
        row("Sharpe Ratio", s.sharpe_display(), ""),
        row(
            "Max Drawdown",
            format!("{:.2}%", s.max_drawdown_pct),
            sign_class(s.max_drawdown_pct),
        ),
        row(
            "Max Drawdown Duration",
            format!("{} bars", s.max_drawdown_duration),
            "",
        ),
        row("Total Trades", s.total_trades.to_string(), ""),
        row(
            "Won / Lost",
            format!("{} / {}", s.trades_won, s.trades_lost),
            "",
        ),
        row("Win Rate", format!("{:.1}%", s.win_rate_pct), ""),
        row("Gross Profit", format!("{:.2}", s.gross_profit), "pos"),
        row("Gross Loss", format!("{:.2}", s.gross_loss), sign_class(s.gross_loss)),
        row("Net P&L", format!("{:.2}", s.net_pnl), sign_class(s.net_pnl)),
        row(
            "Average Trade",
            format!("{:.2}", s.avg_trade_pnl),
            sign_class(s.avg_trade_pnl),
        ),
        row("Largest Win", format!("{:.2}", s.largest_win), ""),
        row("Largest Loss", format!("{:.2}", s.largest_loss), ""),
        row("Open Trades", s.open_trades.to_string(), ""),
    ]
}

fn trade_rows(ctx: &ReportContext<'_>) -> Vec<TradeRow> {
    ctx.result
        .trades
        .iter()
        .enumerate()
        .map(|(i, t)| TradeRow {
            number: i + 1,
            entry_date: t.entry_date.to_string(),
            entry_price: format!("{:.2}", t.entry_price),
            exit_date: t.exit_date.to_string(),
            exit_price: format!("{:.2}", t.exit_price),
            quantity: format_quantity(t.quantity),
            bars_held: t.bars_held(),
            pnl: format!("{:.2}", t.pnl),
            return_pct: format!("{:.2}%", t.return_pct()),
            class: sign_class(t.pnl),
        })
        .collect()
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{:.0}", quantity)
    } else {
        format!("{:.4}", quantity)
    }
}

/// Month-over-month returns from month-end equity. The first month is
/// measured against `initial_cash`.
fn compute_monthly_returns(equity_curve: &[EquityPoint], initial_cash: f64) -> Vec<MonthlyReturnRow> {
    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for point in equity_curve {
        month_end.insert((point.date.year(), point.date.month()), point.equity);
    }

    let mut returns: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    let mut previous = initial_cash;
    for (&key, &equity) in &month_end {
        if previous > 0.0 {
            returns.insert(key, (equity / previous - 1.0) * 100.0);
        }
        previous = equity;
    }

    let (Some(first), Some(last)) = (month_end.keys().next(), month_end.keys().next_back()) else {
        return Vec::new();
    };

    (first.0..=last.0)
        .map(|year| MonthlyReturnRow {
            year,
            months: (1..=12u32)
                .map(|month| returns.get(&(year, month)).map(|r| format!("{:+.2}", r)))
                .collect(),
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct HtmlReportAdapter;

impl HtmlReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for HtmlReportAdapter {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, CrossbtError> {
        let strategy = ctx.params.to_string();
        let title = format!("{} | {}", ctx.ticker, strategy);
        let chart_svg = render_chart(&ChartData {
            title: &title,
            bars: ctx.bars,
            trades: &ctx.result.trades,
            open_position: ctx.result.open_position.as_ref(),
            equity_curve: &ctx.result.equity_curve,
            initial_cash: ctx.initial_cash,
        });

        let open_position = ctx.result.open_position.as_ref().map(|p| {
            format!(
                "{} shares since {} at {:.2}",
                format_quantity(p.quantity),
                p.entry_date,
                p.entry_price
            )
        });

        let template = ReportTemplate {
            ticker: ctx.ticker,
            strategy,
            start_date: ctx.start.to_string(),
            end_date: ctx.end.to_string(),
            bar_count: ctx.bars.len(),
            initial_cash: format!("{:.2}", ctx.initial_cash),
            execution: ctx.result.execution.to_string(),
            metrics: metric_rows(ctx),
            chart_svg,
            trades: trade_rows(ctx),
            open_position,
            monthly_returns: compute_monthly_returns(&ctx.result.equity_curve, ctx.initial_cash),
        };

        template.render().map_err(|e| CrossbtError::Report {
            reason: e.to_string(),
        })
    }
}
