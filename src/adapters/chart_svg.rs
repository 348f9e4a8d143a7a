//! Standalone SVG chart: candlesticks with trade markers over an equity panel.

use std::fmt::Write;

use crate::domain::error::CrossbtError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::portfolio::EquityPoint;
use crate::domain::position::{Position, TradeRecord};
use crate::ports::report_port::{ReportContext, ReportPort};

const WIDTH: f64 = 960.0;
const PAD_LEFT: f64 = 70.0;
const PAD_RIGHT: f64 = 20.0;
const TITLE_HEIGHT: f64 = 30.0;
const PRICE_HEIGHT: f64 = 360.0;
const PANEL_GAP: f64 = 40.0;
const EQUITY_HEIGHT: f64 = 160.0;
const FOOTER: f64 = 30.0;

const BULL: &str = "#16a34a";
const BEAR: &str = "#dc2626";
const EQUITY: &str = "#2563eb";

/// Linear map from a value range onto a vertical pixel band.
struct Scale {
    min: f64,
    max: f64,
    top: f64,
    height: f64,
}

impl Scale {
    fn new(values: impl Iterator<Item = f64>, top: f64, height: f64) -> Self {
        let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in values {
            min = min.min(v);
            max = max.max(v);
        }
        if !min.is_finite() || !max.is_finite() {
            (min, max) = (0.0, 1.0);
        }
        // flat series still get a visible band
        let margin = if max > min { (max - min) * 0.05 } else { min.abs().max(1.0) * 0.01 };
        Scale {
            min: min - margin,
            max: max + margin,
            top,
            height,
        }
    }

    fn y(&self, value: f64) -> f64 {
        self.top + (self.max - value) / (self.max - self.min) * self.height
    }
}

/// Chart inputs, borrowed from a finished run.
pub struct ChartData<'a> {
    pub title: &'a str,
    pub bars: &'a [PriceBar],
    pub trades: &'a [TradeRecord],
    pub open_position: Option<&'a Position>,
    pub equity_curve: &'a [EquityPoint],
    pub initial_cash: f64,
}

pub fn render_chart(data: &ChartData<'_>) -> String {
    let height = TITLE_HEIGHT + PRICE_HEIGHT + PANEL_GAP + EQUITY_HEIGHT + FOOTER;
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
    let _ = writeln!(
        svg,
        r#"<text x="{PAD_LEFT}" y="20" font-size="14" font-weight="bold">{}</text>"#,
        escape(data.title)
    );

    if data.bars.is_empty() {
        let _ = writeln!(
            svg,
            r#"<text x="{PAD_LEFT}" y="{}">No price data available.</text>"#,
            TITLE_HEIGHT + 20.0
        );
        svg.push_str("</svg>\n");
        return svg;
    }

    let plot_width = WIDTH - PAD_LEFT - PAD_RIGHT;
    let step = plot_width / data.bars.len() as f64;
    let x_at = |i: usize| PAD_LEFT + step * (i as f64 + 0.5);

    let price = Scale::new(
        data.bars.iter().flat_map(|b| [b.low, b.high]),
        TITLE_HEIGHT,
        PRICE_HEIGHT,
    );
    write_frame(&mut svg, &price, plot_width, 2);
    write_candles(&mut svg, data.bars, &price, step, &x_at);
    write_markers(&mut svg, data, &price, step, &x_at);

    let equity_top = TITLE_HEIGHT + PRICE_HEIGHT + PANEL_GAP;
    let equity = Scale::new(
        data.equity_curve
            .iter()
            .map(|p| p.equity)
            .chain(std::iter::once(data.initial_cash)),
        equity_top,
        EQUITY_HEIGHT,
    );
    write_frame(&mut svg, &equity, plot_width, 0);
    write_equity(&mut svg, data, &equity, plot_width, &x_at);

    let first = data.bars[0].date;
    let last = data.bars[data.bars.len() - 1].date;
    let label_y = height - 10.0;
    let _ = writeln!(svg, r#"<text x="{PAD_LEFT}" y="{label_y}">{first}</text>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{label_y}" text-anchor="end">{last}</text>"#,
        WIDTH - PAD_RIGHT
    );
    svg.push_str("</svg>\n");
    svg
}

fn write_frame(svg: &mut String, scale: &Scale, plot_width: f64, decimals: usize) {
    let _ = writeln!(
        svg,
        r##"<rect x="{PAD_LEFT}" y="{:.1}" width="{plot_width:.1}" height="{:.1}" fill="none" stroke="#d1d5db"/>"##,
        scale.top, scale.height
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{:.1}" text-anchor="end">{:.*}</text>"#,
        PAD_LEFT - 6.0,
        scale.top + 10.0,
        decimals,
        scale.max
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{:.1}" text-anchor="end">{:.*}</text>"#,
        PAD_LEFT - 6.0,
        scale.top + scale.height,
        decimals,
        scale.min
    );
}

fn write_candles(
    svg: &mut String,
    bars: &[PriceBar],
    price: &Scale,
    step: f64,
    x_at: &dyn Fn(usize) -> f64,
) {
    let body_width = (step * 0.6).max(1.0);
    for (i, bar) in bars.iter().enumerate() {
        let x = x_at(i);
        let color = if bar.is_bullish() { BULL } else { BEAR };
        let top = price.y(bar.open.max(bar.close));
        let bottom = price.y(bar.open.min(bar.close));
        let _ = writeln!(
            svg,
            r#"<line x1="{x:.1}" y1="{:.1}" x2="{x:.1}" y2="{:.1}" stroke="{color}"/>"#,
            price.y(bar.high),
            price.y(bar.low)
        );
        let _ = writeln!(
            svg,
            r#"<rect class="candle" x="{:.1}" y="{top:.1}" width="{body_width:.1}" height="{:.1}" fill="{color}"><title>{} O {:.2} H {:.2} L {:.2} C {:.2}</title></rect>"#,
            x - body_width / 2.0,
            (bottom - top).max(0.5),
            bar.date,
            bar.open,
            bar.high,
            bar.low,
            bar.close
        );
    }
}

fn write_markers(
    svg: &mut String,
    data: &ChartData<'_>,
    price: &Scale,
    step: f64,
    x_at: &dyn Fn(usize) -> f64,
) {
    let size = (step * 0.8).clamp(4.0, 9.0);
    let bar_at = |i: usize| data.bars.get(i);

    let entries = data
        .trades
        .iter()
        .map(|t| (t.entry_index, t.entry_price))
        .chain(data.open_position.map(|p| (p.entry_index, p.entry_price)));
    for (index, fill) in entries {
        let Some(bar) = bar_at(index) else { continue };
        let (x, y) = (x_at(index), price.y(bar.low) + 4.0);
        let _ = writeln!(
            svg,
            r#"<path class="buy" d="M{x:.1},{y:.1} l{size:.1},{:.1} h{:.1} z" fill="{BULL}"><title>BUY {} @ {fill:.2}</title></path>"#,
            size * 1.5,
            -2.0 * size,
            bar.date
        );
    }

    for trade in data.trades {
        let Some(bar) = bar_at(trade.exit_index) else { continue };
        let (x, y) = (x_at(trade.exit_index), price.y(bar.high) - 4.0);
        let _ = writeln!(
            svg,
            r#"<path class="sell" d="M{x:.1},{y:.1} l{size:.1},{:.1} h{:.1} z" fill="{BEAR}"><title>SELL {} @ {:.2} ({:+.2})</title></path>"#,
            -size * 1.5,
            -2.0 * size,
            bar.date,
            trade.exit_price,
            trade.pnl
        );
    }
}

fn write_equity(
    svg: &mut String,
    data: &ChartData<'_>,
    equity: &Scale,
    plot_width: f64,
    x_at: &dyn Fn(usize) -> f64,
) {
    let baseline = equity.y(data.initial_cash);
    let _ = writeln!(
        svg,
        r##"<line x1="{PAD_LEFT}" y1="{baseline:.1}" x2="{:.1}" y2="{baseline:.1}" stroke="#9ca3af" stroke-dasharray="4 3"/>"##,
        PAD_LEFT + plot_width
    );

    let points: Vec<String> = data
        .equity_curve
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{:.1},{:.1}", x_at(i), equity.y(p.equity)))
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline class="equity" points="{}" fill="none" stroke="{EQUITY}" stroke-width="1.5"/>"#,
        points.join(" ")
    );
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writes the chart as a standalone `.svg` file.
#[derive(Debug, Default)]
pub struct SvgChartAdapter;

impl SvgChartAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for SvgChartAdapter {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, CrossbtError> {
        let title = format!("{} | {}", ctx.ticker, ctx.params);
        Ok(render_chart(&ChartData {
            title: &title,
            bars: ctx.bars,
            trades: &ctx.result.trades,
            open_position: ctx.result.open_position.as_ref(),
            equity_curve: &ctx.result.equity_curve,
            initial_cash: ctx.initial_cash,
        }))
    }
}
