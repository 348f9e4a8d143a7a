//! Yahoo Finance chart API adapter.
//!
//! The response parser is always built; the HTTP client needs the `yahoo`
//! feature.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::domain::error::CrossbtError;
use crate::domain::ohlcv::PriceBar;

pub const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Chart URL for daily bars covering `[start, end]`.
pub fn chart_url(base_url: &str, ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
    let period1 = start.and_hms_opt(0, 0, 0).map_or(0, |t| t.and_utc().timestamp());
    let period2 = end
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(i64::MAX, |t| t.and_utc().timestamp());
    format!(
        "{}/{}?period1={}&period2={}&interval=1d&events=history",
        base_url, ticker, period1, period2
    )
}

/// Parse a chart response body into bars ordered by date.
///
/// Rows with any missing field are skipped. An error payload, a
/// malformed body or a result without usable rows is `DataUnavailable`.
pub fn parse_chart_response(ticker: &str, body: &str) -> Result<Vec<PriceBar>, CrossbtError> {
    let response: YahooResponse = serde_json::from_str(body)
        .map_err(|e| CrossbtError::unavailable(ticker, format!("malformed response: {}", e)))?;

    if let Some(error) = response.chart.error {
        return Err(CrossbtError::unavailable(
            ticker,
            format!("{} - {}", error.code, error.description),
        ));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| CrossbtError::unavailable(ticker, "empty result"))?;

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| CrossbtError::unavailable(ticker, "no quote data"))?;

    let mut bars: Vec<PriceBar> = Vec::with_capacity(result.timestamp.len());
    let mut skipped = 0usize;

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let row = (
            DateTime::from_timestamp(ts + offset, 0).map(|t| t.date_naive()),
            value_at(&quote.open, i),
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
            value_at(&quote.volume, i),
        );

        let (Some(date), Some(open), Some(high), Some(low), Some(close), Some(volume)) = row else {
            skipped += 1;
            continue;
        };
        let bar = PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        };

        // a live session can repeat the last date; keep the newest row
        match bars.last_mut() {
            Some(last) if last.date == date => *last = bar,
            _ => bars.push(bar),
        }
    }

    bars.sort_by_key(|b| b.date);
    debug!(ticker, rows = result.timestamp.len(), skipped, "parsed yahoo chart");

    if bars.is_empty() {
        return Err(CrossbtError::unavailable(ticker, "no complete rows in response"));
    }
    Ok(bars)
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

#[cfg(feature = "yahoo")]
pub use client::YahooAdapter;

#[cfg(feature = "yahoo")]
mod client {
    use super::*;
    use crate::ports::data_port::DataPort;

    pub struct YahooAdapter {
        base_url: String,
        client: reqwest::blocking::Client,
    }

    impl YahooAdapter {
        pub fn new() -> Result<Self, CrossbtError> {
            Self::with_base_url(BASE_URL)
        }

        pub fn with_base_url(base_url: &str) -> Result<Self, CrossbtError> {
            let client = reqwest::blocking::Client::builder()
                .user_agent("Mozilla/5.0")
                .build()
                .map_err(|e| CrossbtError::unavailable("yahoo", e.to_string()))?;
            Ok(Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                client,
            })
        }
    }

    impl DataPort for YahooAdapter {
        fn fetch_bars(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceBar>, CrossbtError> {
            let url = chart_url(&self.base_url, ticker, start, end);
            debug!(%url, "fetching yahoo chart");

            let body = self
                .client
                .get(&url)
                .send()
                .and_then(|r| r.text())
                .map_err(|e| CrossbtError::unavailable(ticker, format!("request failed: {}", e)))?;

            let mut bars = parse_chart_response(ticker, &body)?;
            bars.retain(|b| b.date >= start && b.date <= end);
            if bars.is_empty() {
                return Err(CrossbtError::unavailable(
                    ticker,
                    format!("no bars between {} and {}", start, end),
                ));
            }
            Ok(bars)
        }
    }
}
