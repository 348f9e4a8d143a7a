#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::NaiveDate;
use crossbt::domain::error::CrossbtError;
pub use crossbt::domain::ohlcv::PriceBar;
use crossbt::ports::data_port::DataPort;

/// In-memory `DataPort` that records each request.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrossbtError> {
        self.requests
            .borrow_mut()
            .push((ticker.to_string(), start, end));
        if let Some(reason) = self.errors.get(ticker) {
            return Err(CrossbtError::unavailable(ticker, reason.clone()));
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start && b.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(CrossbtError::unavailable(ticker, "no bars in range"));
        }
        Ok(bars)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily bars from 2024-01-01 whose open trails the close by half a point.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = close - 0.5;
            PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open,
                high: close.max(open) + 1.0,
                low: close.min(open) - 1.0,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect()
}

pub fn constant(price: f64, n: usize) -> Vec<f64> {
    vec![price; n]
}

/// `n` closes evenly spaced from `from` to `to` inclusive.
pub fn linear(from: f64, to: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
        .collect()
}

/// 40 bars up by one point, then 40 bars down by two.
pub fn rise_then_fall() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
    closes.extend((1..=40).map(|i| 139.0 - 2.0 * i as f64));
    closes
}

/// Oscillating closes around 100.
pub fn wave(n: usize, period: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + amplitude * (i as f64 * std::f64::consts::TAU / period).sin())
        .collect()
}
