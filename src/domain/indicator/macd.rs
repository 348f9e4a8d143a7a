//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded from the first valid line values
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: slow - 1 + signal - 1 bars (requires fast <= slow)

use crate::domain::indicator::ema::{calculate_ema, ema_over};
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let ema_fast = calculate_ema(bars, fast).simple_values();
    let ema_slow = calculate_ema(bars, slow).simple_values();

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_over(&line, signal_period);

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let point = line[i].zip(signal[i]);
            let (macd, sig) = point.unwrap_or((0.0, 0.0));
            IndicatorPoint {
                date: bar.date,
                valid: point.is_some(),
                value: IndicatorValue::Macd {
                    line: macd,
                    signal: sig,
                    histogram: macd - sig,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
