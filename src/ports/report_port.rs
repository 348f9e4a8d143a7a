//! Report generation port trait.

use std::path::Path;

use chrono::NaiveDate;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CrossbtError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::strategy::StrategyParams;

/// Everything a report may render for one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub ticker: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_cash: f64,
    pub params: &'a StrategyParams,
    pub bars: &'a [PriceBar],
    pub result: &'a BacktestResult,
}

/// Port for writing backtest artifacts.
pub trait ReportPort {
    fn render(&self, ctx: &ReportContext<'_>) -> Result<String, CrossbtError>;

    fn write(&self, ctx: &ReportContext<'_>, output_path: &Path) -> Result<(), CrossbtError> {
        let content = self.render(ctx)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output_path, content)?;
        Ok(())
    }
}
