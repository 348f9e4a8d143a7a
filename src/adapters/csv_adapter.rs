//! CSV file data adapter.
//!
//! One file per ticker, `<dir>/<TICKER>.csv`, with the header
//! `Date,Open,High,Low,Close,Volume`. [`write_bars`] produces the same layout.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::CrossbtError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<CsvRow> for PriceBar {
    fn from(row: CsvRow) -> Self {
        PriceBar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

impl From<&PriceBar> for CsvRow {
    fn from(bar: &PriceBar) -> Self {
        CsvRow {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrossbtError> {
        let path = self.csv_path(ticker);
        let file = File::open(&path).map_err(|e| {
            CrossbtError::unavailable(ticker, format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut bars = read_bars(file).map_err(|e| {
            CrossbtError::unavailable(ticker, format!("{}: {}", path.display(), e))
        })?;
        let total = bars.len();
        bars.retain(|b| b.date >= start && b.date <= end);
        debug!(ticker, path = %path.display(), total, kept = bars.len(), "loaded csv");

        if bars.is_empty() {
            return Err(CrossbtError::unavailable(
                ticker,
                format!("no bars between {} and {}", start, end),
            ));
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

/// Parse bars from any CSV source with the export header.
pub fn read_bars<R: std::io::Read>(reader: R) -> Result<Vec<PriceBar>, csv::Error> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize::<CsvRow>()
        .map(|row| row.map(PriceBar::from))
        .collect()
}

/// Write bars with the `Date,Open,High,Low,Close,Volume` header.
pub fn write_bars<W: Write>(writer: W, bars: &[PriceBar]) -> Result<(), CrossbtError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for bar in bars {
        wtr.serialize(CsvRow::from(bar))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Export bars to `path`, creating parent directories as needed.
pub fn export_bars(path: &Path, bars: &[PriceBar]) -> Result<(), CrossbtError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_bars(File::create(path)?, bars)
}
