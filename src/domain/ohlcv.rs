//! Daily OHLCV price bar.

use chrono::NaiveDate;

use crate::domain::error::CrossbtError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Check that a series is non-empty, strictly ordered by date and carries
/// finite prices.
pub fn validate_series(ticker: &str, bars: &[PriceBar]) -> Result<(), CrossbtError> {
    if bars.is_empty() {
        return Err(CrossbtError::unavailable(ticker, "price series is empty"));
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(CrossbtError::unavailable(
                ticker,
                format!("non-finite price on {}", bar.date),
            ));
        }
        if i > 0 && bar.date <= bars[i - 1].date {
            let reason = if bar.date == bars[i - 1].date {
                format!("duplicate bar for {}", bar.date)
            } else {
                format!("bar for {} is out of order", bar.date)
            };
            return Err(CrossbtError::unavailable(ticker, reason));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: 50_000.0,
        }
    }

    #[test]
    fn bullish_when_close_at_or_above_open() {
        assert!(bar("2024-01-15", 105.0).is_bullish());
        assert!(bar("2024-01-15", 100.0).is_bullish());
        assert!(!bar("2024-01-15", 95.0).is_bullish());
    }

    #[test]
    fn validate_accepts_ordered_series() {
        let bars = vec![bar("2024-01-15", 1.0), bar("2024-01-16", 2.0)];
        assert!(validate_series("TEST", &bars).is_ok());
    }

    #[test]
    fn validate_rejects_empty_series() {
        let err = validate_series("TEST", &[]).unwrap_err();
        assert!(matches!(err, CrossbtError::DataUnavailable { .. }));
    }

    #[test]
    fn validate_rejects_duplicate_dates() {
        let bars = vec![bar("2024-01-15", 1.0), bar("2024-01-15", 2.0)];
        let err = validate_series("TEST", &bars).unwrap_err();
        assert!(err.to_string().contains("duplicate bar for 2024-01-15"));
    }

    #[test]
    fn validate_rejects_unordered_dates() {
        let bars = vec![bar("2024-01-16", 1.0), bar("2024-01-15", 2.0)];
        let err = validate_series("TEST", &bars).unwrap_err();
        assert!(err.to_string().contains("out of order"));
    }

    #[test]
    fn validate_rejects_nan_price() {
        let bars = vec![bar("2024-01-15", f64::NAN)];
        assert!(validate_series("TEST", &bars).is_err());
    }
}
