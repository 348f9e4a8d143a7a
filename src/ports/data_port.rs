//! Price history source.

use crate::domain::error::CrossbtError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `ticker` within `[start, end]`, ordered by date.
    ///
    /// An unknown ticker or an empty range is `DataUnavailable`.
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrossbtError>;
}
