//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every indicator is causal: the point at index `i` only depends on bars
//! `0..=i`, so computing over a truncated history yields the same prefix.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

/// Which scalar to read out of an indicator point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorValue {
    pub fn field(&self, field: IndicatorField) -> Option<f64> {
        match (self, field) {
            (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
            (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine) => Some(*line),
            (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => Some(*signal),
            _ => None,
        }
    }
}

impl IndicatorSeries {
    /// Project one field into a plain series, `None` on warmup bars.
    pub fn field_values(&self, field: IndicatorField) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|p| if p.valid { p.value.field(field) } else { None })
            .collect()
    }

    /// Shorthand for `field_values(IndicatorField::Value)`.
    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.field_values(IndicatorField::Value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
