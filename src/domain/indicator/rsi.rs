//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (or 50 when avg_gain is also 0)
//!
//! Warmup: first n bars are invalid (need n price changes).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let rsi = if i == 0 || period == 0 {
            None
        } else {
            let change = bar.close - bars[i - 1].close;
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);

            if i <= period {
                avg_gain += gain / period as f64;
                avg_loss += loss / period as f64;
            } else {
                avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
                avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
            }

            (i >= period).then(|| rsi_from_averages(avg_gain, avg_loss))
        };

        values.push(IndicatorPoint {
            date: bar.date,
            valid: rsi.is_some(),
            value: IndicatorValue::Simple(rsi.unwrap_or(0.0)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
