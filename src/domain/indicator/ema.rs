//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the SMA of the first n values (taken as offsets
//! from the first value), then
//! EMA[i] = EMA[i-1] + k*(x[i] - EMA[i-1]), which equals x[i]*k + EMA[i-1]*(1-k)
//! but leaves a flat input exactly flat.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let closes: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    let values = ema_over(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(ema, bar)| IndicatorPoint {
            date: bar.date,
            valid: ema.is_some(),
            value: IndicatorValue::Simple(ema.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over a series with a leading warmup gap.
///
/// Leading `None`s are skipped; the seed is the mean of the first `period`
/// defined values. Once seeded, a later `None` leaves the average unchanged
/// and yields `None` for that slot.
pub(crate) fn ema_over(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut anchor: Option<f64> = None;
    let mut offset_sum = 0.0;
    let mut seen = 0usize;
    let mut ema: Option<f64> = None;

    for (slot, value) in out.iter_mut().zip(input) {
        let Some(x) = *value else { continue };

        ema = match ema {
            Some(prev) => Some(prev + k * (x - prev)),
            None => {
                let base = *anchor.get_or_insert(x);
                offset_sum += x - base;
                seen += 1;
                (seen == period).then(|| base + offset_sum / period as f64)
            }
        };
        *slot = ema;
    }

    out
}
