//! Strategy parameters and the crossover evaluator.
//!
//! Each variant is a parameterization of [`Crossover`]: compute two
//! comparable series, then detect a sign change of their difference.
//!
//! | variant | entry (Buy)                     | exit (Sell)                     |
//! |---------|---------------------------------|---------------------------------|
//! | SMA     | SMA(fast) crosses above SMA(slow) | SMA(fast) crosses below SMA(slow) |
//! | RSI     | RSI crosses below `buy_below`   | RSI crosses above `sell_above`  |
//! | MACD    | line crosses above signal       | line crosses below signal       |

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::domain::crossover::{decide, CrossDirection, Crossover, Operand, Signal};
use crate::domain::error::CrossbtError;
use crate::domain::indicator::{
    calculate_macd, calculate_rsi, calculate_sma, macd, IndicatorField, IndicatorType,
};
use crate::domain::ohlcv::PriceBar;

pub const SMA_FAST_RANGE: RangeInclusive<usize> = 5..=30;
pub const SMA_SLOW_RANGE: RangeInclusive<usize> = 20..=100;
pub const RSI_PERIOD_RANGE: RangeInclusive<usize> = 7..=21;
pub const RSI_BUY_RANGE: RangeInclusive<f64> = 10.0..=50.0;
pub const RSI_SELL_RANGE: RangeInclusive<f64> = 50.0..=90.0;
pub const MACD_FAST_RANGE: RangeInclusive<usize> = 5..=15;
pub const MACD_SLOW_RANGE: RangeInclusive<usize> = 20..=40;
pub const MACD_SIGNAL_RANGE: RangeInclusive<usize> = 5..=15;

/// Decision contract driven by the backtest runner.
///
/// `history` holds every bar up to and including the bar being decided.
pub trait Evaluator {
    fn name(&self) -> String;

    /// Minimum number of bars before any decision can be made.
    fn lookback(&self) -> usize;

    fn evaluate(&self, history: &[PriceBar]) -> Signal;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SmaCross,
    Rsi,
    Macd,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::SmaCross, StrategyKind::Rsi, StrategyKind::Macd];

    pub fn key(&self) -> &'static str {
        match self {
            StrategyKind::SmaCross => "sma",
            StrategyKind::Rsi => "rsi",
            StrategyKind::Macd => "macd",
        }
    }

    pub fn default_params(&self) -> StrategyParams {
        match self {
            StrategyKind::SmaCross => StrategyParams::SmaCross { fast: 10, slow: 30 },
            StrategyKind::Rsi => StrategyParams::Rsi {
                period: 14,
                buy_below: 30.0,
                sell_above: 70.0,
            },
            StrategyKind::Macd => StrategyParams::Macd {
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                signal: macd::DEFAULT_SIGNAL,
            },
        }
    }

    /// Human-readable parameter ranges, one line per parameter.
    pub fn describe_ranges(&self) -> Vec<String> {
        fn line<T: fmt::Display>(key: &str, range: &RangeInclusive<T>, default: T) -> String {
            format!(
                "{:<12} {}..={} (default {})",
                key,
                range.start(),
                range.end(),
                default
            )
        }
        match self.default_params() {
            StrategyParams::SmaCross { fast, slow } => vec![
                line("fast", &SMA_FAST_RANGE, fast),
                line("slow", &SMA_SLOW_RANGE, slow),
            ],
            StrategyParams::Rsi {
                period,
                buy_below,
                sell_above,
            } => vec![
                line("rsi_period", &RSI_PERIOD_RANGE, period),
                line("rsi_buy", &RSI_BUY_RANGE, buy_below),
                line("rsi_sell", &RSI_SELL_RANGE, sell_above),
            ],
            StrategyParams::Macd { fast, slow, signal } => vec![
                line("macd_fast", &MACD_FAST_RANGE, fast),
                line("macd_slow", &MACD_SLOW_RANGE, slow),
                line("macd_signal", &MACD_SIGNAL_RANGE, signal),
            ],
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::SmaCross => write!(f, "SMA Crossover"),
            StrategyKind::Rsi => write!(f, "RSI"),
            StrategyKind::Macd => write!(f, "MACD"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = CrossbtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" | "sma_cross" | "sma crossover" => Ok(StrategyKind::SmaCross),
            "rsi" => Ok(StrategyKind::Rsi),
            "macd" => Ok(StrategyKind::Macd),
            other => Err(CrossbtError::invalid(format!(
                "unknown strategy '{}' (expected sma, rsi or macd)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyParams {
    SmaCross {
        fast: usize,
        slow: usize,
    },
    Rsi {
        period: usize,
        buy_below: f64,
        sell_above: f64,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl StrategyParams {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyParams::SmaCross { .. } => StrategyKind::SmaCross,
            StrategyParams::Rsi { .. } => StrategyKind::Rsi,
            StrategyParams::Macd { .. } => StrategyKind::Macd,
        }
    }

    pub fn validate(&self) -> Result<(), CrossbtError> {
        match *self {
            StrategyParams::SmaCross { fast, slow } => {
                check_range("fast", fast, &SMA_FAST_RANGE)?;
                check_range("slow", slow, &SMA_SLOW_RANGE)?;
                check_order("fast", fast, "slow", slow)
            }
            StrategyParams::Rsi {
                period,
                buy_below,
                sell_above,
            } => {
                check_range("rsi_period", period, &RSI_PERIOD_RANGE)?;
                check_range("rsi_buy", buy_below, &RSI_BUY_RANGE)?;
                check_range("rsi_sell", sell_above, &RSI_SELL_RANGE)?;
                check_order("rsi_buy", buy_below, "rsi_sell", sell_above)
            }
            StrategyParams::Macd { fast, slow, signal } => {
                check_range("macd_fast", fast, &MACD_FAST_RANGE)?;
                check_range("macd_slow", slow, &MACD_SLOW_RANGE)?;
                check_range("macd_signal", signal, &MACD_SIGNAL_RANGE)?;
                check_order("macd_fast", fast, "macd_slow", slow)
            }
        }
    }

    /// Bars needed before the first signal can be produced.
    pub fn lookback(&self) -> usize {
        match *self {
            StrategyParams::SmaCross { fast, slow } => fast.max(slow),
            StrategyParams::Rsi { period, .. } => period + 1,
            StrategyParams::Macd { slow, signal, .. } => slow + signal - 1,
        }
    }

    pub fn indicators(&self) -> Vec<IndicatorType> {
        match *self {
            StrategyParams::SmaCross { fast, slow } => {
                vec![IndicatorType::Sma(fast), IndicatorType::Sma(slow)]
            }
            StrategyParams::Rsi { period, .. } => vec![IndicatorType::Rsi(period)],
            StrategyParams::Macd { fast, slow, signal } => {
                vec![IndicatorType::Macd { fast, slow, signal }]
            }
        }
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyParams::SmaCross { fast, slow } => {
                write!(f, "SMA Crossover (fast={}, slow={})", fast, slow)
            }
            StrategyParams::Rsi {
                period,
                buy_below,
                sell_above,
            } => write!(
                f,
                "RSI (period={}, buy<{}, sell>{})",
                period, buy_below, sell_above
            ),
            StrategyParams::Macd { fast, slow, signal } => write!(
                f,
                "MACD (fast={}, slow={}, signal={})",
                fast, slow, signal
            ),
        }
    }
}

fn check_range<T>(key: &str, value: T, range: &RangeInclusive<T>) -> Result<(), CrossbtError>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CrossbtError::invalid(format!(
            "{} = {} is outside {}..={}",
            key,
            value,
            range.start(),
            range.end()
        )))
    }
}

fn check_order<T>(low_key: &str, low: T, high_key: &str, high: T) -> Result<(), CrossbtError>
where
    T: PartialOrd + fmt::Display,
{
    if low < high {
        Ok(())
    } else {
        Err(CrossbtError::invalid(format!(
            "{} ({}) must be less than {} ({})",
            low_key, low, high_key, high
        )))
    }
}

/// Evaluator shared by all three strategy variants.
#[derive(Debug, Clone)]
pub struct CrossoverEvaluator {
    params: StrategyParams,
}

impl CrossoverEvaluator {
    /// Build an evaluator, rejecting out-of-range or misordered parameters.
    pub fn new(params: StrategyParams) -> Result<Self, CrossbtError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Decision at `index` computed over the whole of `bars`.
    ///
    /// Indicators only read bars up to each point, so this equals
    /// `evaluate(&bars[..=index])`.
    pub fn signal_at(&self, bars: &[PriceBar], index: usize) -> Signal {
        if index >= bars.len() || index + 1 < self.lookback() {
            return Signal::Hold;
        }
        let (entry, exit) = self.crosses(bars, index);
        decide(entry, exit)
    }

    /// Entry and exit crosses at `index`.
    fn crosses(&self, bars: &[PriceBar], index: usize) -> (bool, bool) {
        match self.params {
            StrategyParams::SmaCross { fast, slow } => {
                let fast = calculate_sma(bars, fast).simple_values();
                let slow = calculate_sma(bars, slow).simple_values();
                let (left, right) = (Operand::Series(&fast), Operand::Series(&slow));
                (
                    Crossover::new(left, right, CrossDirection::Above).fires_at(index),
                    Crossover::new(left, right, CrossDirection::Below).fires_at(index),
                )
            }
            StrategyParams::Rsi {
                period,
                buy_below,
                sell_above,
            } => {
                let rsi = calculate_rsi(bars, period).simple_values();
                let rsi = Operand::Series(&rsi);
                (
                    Crossover::new(rsi, Operand::Constant(buy_below), CrossDirection::Below)
                        .fires_at(index),
                    Crossover::new(rsi, Operand::Constant(sell_above), CrossDirection::Above)
                        .fires_at(index),
                )
            }
            StrategyParams::Macd { fast, slow, signal } => {
                let macd = calculate_macd(bars, fast, slow, signal);
                let line = macd.field_values(IndicatorField::MacdLine);
                let signal = macd.field_values(IndicatorField::MacdSignal);
                let (left, right) = (Operand::Series(&line), Operand::Series(&signal));
                (
                    Crossover::new(left, right, CrossDirection::Above).fires_at(index),
                    Crossover::new(left, right, CrossDirection::Below).fires_at(index),
                )
            }
        }
    }
}

impl Evaluator for CrossoverEvaluator {
    fn name(&self) -> String {
        self.params.to_string()
    }

    fn lookback(&self) -> usize {
        self.params.lookback()
    }

    fn evaluate(&self, history: &[PriceBar]) -> Signal {
        match history.len().checked_sub(1) {
            Some(last) => self.signal_at(history, last),
            None => Signal::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use proptest::prelude::*;

    fn signals(evaluator: &CrossoverEvaluator, prices: &[f64]) -> Vec<(usize, Signal)> {
        let bars = make_bars(prices);
        (0..bars.len())
            .map(|i| (i, evaluator.evaluate(&bars[..=i])))
            .filter(|(_, s)| *s != Signal::Hold)
            .collect()
    }

    fn sma_10_30() -> CrossoverEvaluator {
        CrossoverEvaluator::new(StrategyParams::SmaCross { fast: 10, slow: 30 }).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        for kind in StrategyKind::ALL {
            assert!(kind.default_params().validate().is_ok(), "{kind}");
            assert_eq!(kind.default_params().kind(), kind);
        }
    }

    #[test]
    fn fast_must_be_below_slow() {
        let err = StrategyParams::SmaCross { fast: 25, slow: 20 }
            .validate()
            .unwrap_err();
        assert!(matches!(err, CrossbtError::InvalidParameters { .. }));
        assert!(err.to_string().contains("fast (25) must be less than slow (20)"));

        let equal = StrategyParams::SmaCross { fast: 20, slow: 20 };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn out_of_range_rejected() {
        let cases = [
            StrategyParams::SmaCross { fast: 4, slow: 30 },
            StrategyParams::SmaCross { fast: 10, slow: 101 },
            StrategyParams::Rsi {
                period: 6,
                buy_below: 30.0,
                sell_above: 70.0,
            },
            StrategyParams::Rsi {
                period: 14,
                buy_below: 55.0,
                sell_above: 70.0,
            },
            StrategyParams::Rsi {
                period: 14,
                buy_below: 30.0,
                sell_above: 95.0,
            },
            StrategyParams::Macd {
                fast: 12,
                slow: 26,
                signal: 0,
            },
            StrategyParams::Macd {
                fast: 16,
                slow: 26,
                signal: 9,
            },
        ];
        for params in cases {
            assert!(
                matches!(params.validate(), Err(CrossbtError::InvalidParameters { .. })),
                "{params}"
            );
        }
    }

    #[test]
    fn rsi_thresholds_must_be_ordered() {
        let params = StrategyParams::Rsi {
            period: 14,
            buy_below: 50.0,
            sell_above: 50.0,
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn evaluator_rejects_invalid_params() {
        let result = CrossoverEvaluator::new(StrategyParams::Macd {
            fast: 26,
            slow: 26,
            signal: 9,
        });
        assert!(result.is_err());
    }

    #[test]
    fn lookbacks() {
        assert_eq!(StrategyKind::SmaCross.default_params().lookback(), 30);
        assert_eq!(StrategyKind::Rsi.default_params().lookback(), 15);
        assert_eq!(StrategyKind::Macd.default_params().lookback(), 34);
    }

    #[test]
    fn parse_kind() {
        assert_eq!("SMA".parse::<StrategyKind>().unwrap(), StrategyKind::SmaCross);
        assert_eq!(" macd ".parse::<StrategyKind>().unwrap(), StrategyKind::Macd);
        assert!("bollinger".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn describe_ranges_lists_every_parameter() {
        let lines = StrategyKind::Rsi.describe_ranges();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("rsi_period"));
        assert!(lines[0].contains("7..=21 (default 14)"));
    }

    #[test]
    fn short_history_holds() {
        let evaluator = sma_10_30();
        let bars = make_bars(&[100.0; 29]);
        assert_eq!(evaluator.evaluate(&bars), Signal::Hold);
        assert_eq!(evaluator.evaluate(&[]), Signal::Hold);
    }

    #[test]
    fn constant_prices_never_trade() {
        let evaluator = sma_10_30();
        assert!(signals(&evaluator, &[100.0; 40]).is_empty());
    }

    #[test]
    fn linear_rise_buys_once_when_slow_average_appears() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + 100.0 * i as f64 / 39.0).collect();
        assert_eq!(signals(&sma_10_30(), &prices), vec![(29, Signal::Buy)]);
    }

    #[test]
    fn averages_meeting_exactly_still_cross() {
        // SMA(5) - SMA(20): -1.5 at bar 20, exactly 0 at bar 21, +3 at bar 22
        let mut prices = vec![100.0; 20];
        prices.extend([90.0, 110.0, 120.0]);
        let evaluator =
            CrossoverEvaluator::new(StrategyParams::SmaCross { fast: 5, slow: 20 }).unwrap();

        assert_eq!(signals(&evaluator, &prices), vec![(22, Signal::Buy)]);
    }

    #[test]
    fn rise_then_fall_buys_then_sells() {
        let mut prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        prices.extend((1..=40).map(|i| 139.0 - 2.0 * i as f64));

        let emitted = signals(&sma_10_30(), &prices);
        assert_eq!(emitted.len(), 2, "{emitted:?}");
        assert_eq!(emitted[0], (29, Signal::Buy));
        assert_eq!(emitted[1].1, Signal::Sell);
        assert!(emitted[1].0 > 40);
    }

    #[test]
    fn rsi_buys_on_dip_and_sells_on_rally() {
        let evaluator = CrossoverEvaluator::new(StrategyKind::Rsi.default_params()).unwrap();
        // gentle chop, a sharp sell-off, then a sharp rally
        let mut prices: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        prices.extend((1..=8).map(|i| 100.0 - 3.0 * i as f64));
        prices.extend((1..=15).map(|i| 76.0 + 4.0 * i as f64));

        let emitted = signals(&evaluator, &prices);
        let kinds: Vec<Signal> = emitted.iter().map(|(_, s)| *s).collect();
        assert_eq!(kinds, vec![Signal::Buy, Signal::Sell], "{emitted:?}");
        assert!(emitted[0].0 >= 20 && emitted[0].0 < 28);
        assert!(emitted[1].0 >= 28);
    }

    #[test]
    fn macd_follows_trend_reversal() {
        let evaluator = CrossoverEvaluator::new(StrategyKind::Macd.default_params()).unwrap();
        // accelerating decline, steady rally, steady decline
        let mut prices: Vec<f64> = (0..40).map(|i| 100.0 - 0.02 * (i * i) as f64).collect();
        prices.extend((1..=30).map(|i| 69.58 + 1.5 * i as f64));
        prices.extend((1..=30).map(|i| 114.58 - 1.5 * i as f64));

        let emitted = signals(&evaluator, &prices);
        let (buy, _) = *emitted
            .iter()
            .find(|(_, s)| *s == Signal::Buy)
            .expect("a buy during the rally");
        let (sell, _) = *emitted
            .iter()
            .find(|(i, s)| *s == Signal::Sell && *i > buy)
            .expect("a sell after the buy");
        assert!((40..70).contains(&buy), "{emitted:?}");
        assert!(sell > 70, "{emitted:?}");
    }

    #[test]
    fn decision_does_not_look_ahead() {
        let mut prices: Vec<f64> = (0..45).map(|i| 100.0 + (i as f64 * 0.7).sin() * 10.0).collect();
        prices.extend((0..20).map(|i| 80.0 + i as f64));
        let bars = make_bars(&prices);

        for kind in StrategyKind::ALL {
            let evaluator = CrossoverEvaluator::new(kind.default_params()).unwrap();
            for i in 0..bars.len() {
                assert_eq!(
                    evaluator.evaluate(&bars[..=i]),
                    evaluator.signal_at(&bars, i),
                    "{kind} at {i}"
                );
            }
        }
    }

    proptest! {
        #[test]
        fn constant_series_never_signals(price in 1.0f64..10_000.0, len in 1usize..80, kind in 0usize..3) {
            let evaluator = CrossoverEvaluator::new(StrategyKind::ALL[kind].default_params()).unwrap();
            let bars = make_bars(&vec![price; len]);
            for i in 0..bars.len() {
                let signal = evaluator.evaluate(&bars[..=i]);
                // a flat RSI sits at 50, strictly between the thresholds
                prop_assert_eq!(signal, Signal::Hold);
            }
        }
    }
}
