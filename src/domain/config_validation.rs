//! Configuration validation and conversion into domain values.
//!
//! Every field is checked before any data is fetched. Unparseable or
//! missing values are config errors; well-formed strategy parameters that
//! fall outside their ranges are `InvalidParameters`.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::backtest::{BacktestConfig, ExecutionPolicy};
use crate::domain::error::CrossbtError;
use crate::domain::strategy::{StrategyKind, StrategyParams};
use crate::ports::config_port::ConfigPort;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("data", &["source", "dir"]),
    (
        "backtest",
        &[
            "ticker",
            "start_date",
            "end_date",
            "initial_cash",
            "execution",
            "fractional_shares",
            "risk_free_rate",
        ],
    ),
    (
        "strategy",
        &[
            "type",
            "fast",
            "slow",
            "rsi_period",
            "rsi_buy",
            "rsi_sell",
            "macd_fast",
            "macd_slow",
            "macd_signal",
        ],
    ),
    ("report", &["html", "chart", "export_csv"]),
];

/// Where price history comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv { dir: PathBuf },
    Yahoo,
}

/// Ticker and inclusive date range to backtest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DataRequest {
    pub fn new(ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, CrossbtError> {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return Err(invalid("backtest", "ticker", "ticker must not be empty"));
        }
        if start >= end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
        Ok(Self {
            ticker: ticker.to_uppercase(),
            start,
            end,
        })
    }
}

/// Optional output artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportPaths {
    pub html: Option<PathBuf>,
    pub chart: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), CrossbtError> {
    for key in unknown_keys(config) {
        warn!(%key, "ignoring unknown config key");
    }
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    Ok(())
}

/// Keys in known sections that nothing reads, as `section.key`.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<String> {
    KNOWN_KEYS
        .iter()
        .flat_map(|(section, known)| {
            config
                .keys(section)
                .into_iter()
                .filter(|k| !known.contains(&k.as_str()))
                .map(move |k| format!("{}.{}", section, k))
        })
        .collect()
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), CrossbtError> {
    build_data_source(config).map(|_| ())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), CrossbtError> {
    build_data_request(config)?;
    build_backtest_config(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), CrossbtError> {
    build_strategy_params(config, None).map(|_| ())
}

pub fn build_data_source(config: &dyn ConfigPort) -> Result<DataSource, CrossbtError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "dir")
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "data".to_string());
            Ok(DataSource::Csv {
                dir: PathBuf::from(dir.trim()),
            })
        }
        "yahoo" => Ok(DataSource::Yahoo),
        other => Err(invalid(
            "data",
            "source",
            &format!("unknown source '{}' (expected csv or yahoo)", other),
        )),
    }
}

pub fn build_data_request(config: &dyn ConfigPort) -> Result<DataRequest, CrossbtError> {
    let ticker = required_string(config, "backtest", "ticker")?;
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;
    DataRequest::new(&ticker, start, end)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, CrossbtError> {
    let defaults = BacktestConfig::default();

    let initial_cash = read_f64(config, "backtest", "initial_cash")?
        .unwrap_or(defaults.initial_cash);
    if !(initial_cash.is_finite() && initial_cash > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }

    let execution = match config.get_string("backtest", "execution") {
        Some(value) => ExecutionPolicy::from_str(&value)
            .map_err(|e| invalid("backtest", "execution", &reason_of(e)))?,
        None => defaults.execution,
    };

    let fractional_shares = match config.get_string("backtest", "fractional_shares") {
        Some(value) => parse_bool(&value).ok_or_else(|| {
            invalid(
                "backtest",
                "fractional_shares",
                "expected true/false, yes/no or 1/0",
            )
        })?,
        None => defaults.fractional_shares,
    };

    let risk_free_rate = read_f64(config, "backtest", "risk_free_rate")?
        .unwrap_or(defaults.risk_free_rate);
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }

    Ok(BacktestConfig {
        initial_cash,
        execution,
        fractional_shares,
        risk_free_rate,
    })
}

/// Strategy parameters from `[strategy]`; `kind_override` replaces `type`.
///
/// Keys left out take the variant's defaults.
pub fn build_strategy_params(
    config: &dyn ConfigPort,
    kind_override: Option<StrategyKind>,
) -> Result<StrategyParams, CrossbtError> {
    let kind = match kind_override {
        Some(kind) => kind,
        None => {
            let name = required_string(config, "strategy", "type")?;
            StrategyKind::from_str(&name)
                .map_err(|e| invalid("strategy", "type", &reason_of(e)))?
        }
    };

    let params = match kind.default_params() {
        StrategyParams::SmaCross { fast, slow } => StrategyParams::SmaCross {
            fast: read_usize(config, "strategy", "fast")?.unwrap_or(fast),
            slow: read_usize(config, "strategy", "slow")?.unwrap_or(slow),
        },
        StrategyParams::Rsi {
            period,
            buy_below,
            sell_above,
        } => StrategyParams::Rsi {
            period: read_usize(config, "strategy", "rsi_period")?.unwrap_or(period),
            buy_below: read_f64(config, "strategy", "rsi_buy")?.unwrap_or(buy_below),
            sell_above: read_f64(config, "strategy", "rsi_sell")?.unwrap_or(sell_above),
        },
        StrategyParams::Macd { fast, slow, signal } => StrategyParams::Macd {
            fast: read_usize(config, "strategy", "macd_fast")?.unwrap_or(fast),
            slow: read_usize(config, "strategy", "macd_slow")?.unwrap_or(slow),
            signal: read_usize(config, "strategy", "macd_signal")?.unwrap_or(signal),
        },
    };

    params.validate()?;
    Ok(params)
}

pub fn build_report_paths(config: &dyn ConfigPort) -> ReportPaths {
    let path = |key: &str| {
        config
            .get_string("report", key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };
    ReportPaths {
        html: path("html"),
        chart: path("chart"),
        export_csv: path("export_csv"),
    }
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, CrossbtError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        invalid(
            section,
            key,
            &format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}

fn read_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, CrossbtError> {
    let value = required_string(config, section, key)?;
    parse_date(&value, section, key)
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, CrossbtError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CrossbtError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Optional value parsed from its string form; a present but malformed value is an error.
fn read_parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, CrossbtError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            invalid(
                section,
                key,
                &format!("'{}' is not a valid {}", raw.trim(), expected),
            )
        }),
    }
}

fn read_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, CrossbtError> {
    read_parsed(config, section, key, "number")
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, CrossbtError> {
    read_parsed(config, section, key, "non-negative integer")
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> CrossbtError {
    CrossbtError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn reason_of(err: CrossbtError) -> String {
    match err {
        CrossbtError::InvalidParameters { reason } => reason,
        other => other.to_string(),
    }
}
