//! CLI definition and dispatch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::adapters::chart_svg::SvgChartAdapter;
use crate::adapters::csv_adapter::{export_bars, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_report_adapter::HtmlReportAdapter;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    build_backtest_config, build_data_request, build_data_source, build_report_paths,
    build_strategy_params, unknown_keys, validate_config, DataRequest, DataSource, ReportPaths,
};
use crate::domain::error::CrossbtError;
use crate::domain::strategy::{CrossoverEvaluator, Evaluator, StrategyKind, StrategyParams};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{ReportContext, ReportPort};

#[derive(Parser, Debug)]
#[command(name = "crossbt", version, about = "Crossover strategy backtester")]
pub struct Cli {
    /// Log diagnostics at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `[backtest]` ticker and date range.
#[derive(Args, Debug, Default, Clone)]
pub struct RangeArgs {
    #[arg(long)]
    pub ticker: Option<String>,
    /// First bar date, YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,
    /// Last bar date, YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
        /// sma, rsi or macd; replaces [strategy] type
        #[arg(short, long)]
        strategy: Option<StrategyKind>,
        /// Write an HTML report here
        #[arg(long)]
        html: Option<PathBuf>,
        /// Write an SVG chart here
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Download price history to a CSV file
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List strategies and their parameter ranges
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            range,
            strategy,
            html,
            chart,
        } => run_backtest_command(&config, &range, strategy, html, chart),
        Command::Fetch {
            config,
            range,
            output,
        } => run_fetch(&config, &range, &output),
        Command::Validate { config } => run_validate(&config),
        Command::Strategies => {
            print_strategies();
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CrossbtError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// A config with command-line values laid over it.
pub struct LayeredConfig<'a> {
    base: &'a dyn ConfigPort,
    overrides: Vec<(&'static str, &'static str, String)>,
}

impl<'a> LayeredConfig<'a> {
    pub fn new(base: &'a dyn ConfigPort) -> Self {
        Self {
            base,
            overrides: Vec::new(),
        }
    }

    pub fn set(mut self, section: &'static str, key: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.overrides.retain(|(s, k, _)| !(*s == section && *k == key));
            self.overrides.push((section, key, value.to_string()));
        }
        self
    }

    pub fn with_range(self, range: &RangeArgs) -> Self {
        self.set("backtest", "ticker", range.ticker.as_deref())
            .set("backtest", "start_date", range.start.as_deref())
            .set("backtest", "end_date", range.end.as_deref())
    }
}

impl ConfigPort for LayeredConfig<'_> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.overrides
            .iter()
            .find(|(s, k, _)| *s == section && *k == key)
            .map(|(_, _, v)| v.clone())
            .or_else(|| self.base.get_string(section, key))
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: BTreeSet<String> = self.base.keys(section).into_iter().collect();
        keys.extend(
            self.overrides
                .iter()
                .filter(|(s, _, _)| *s == section)
                .map(|(_, k, _)| k.to_string()),
        );
        keys.into_iter().collect()
    }
}

/// Data port for the configured source.
pub fn data_port_for(source: &DataSource) -> Result<Box<dyn DataPort>, CrossbtError> {
    match source {
        DataSource::Csv { dir } => Ok(Box::new(CsvAdapter::new(dir.clone()))),
        #[cfg(feature = "yahoo")]
        DataSource::Yahoo => Ok(Box::new(crate::adapters::yahoo_adapter::YahooAdapter::new()?)),
        #[cfg(not(feature = "yahoo"))]
        DataSource::Yahoo => Err(CrossbtError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "yahoo source requires building with --features yahoo".into(),
        }),
    }
}

/// Everything a backtest needs, resolved from config before any data is fetched.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub request: DataRequest,
    pub config: BacktestConfig,
    pub params: StrategyParams,
    pub reports: ReportPaths,
}

pub fn plan_run(
    config: &dyn ConfigPort,
    strategy: Option<StrategyKind>,
) -> Result<RunPlan, CrossbtError> {
    for key in unknown_keys(config) {
        warn!(%key, "ignoring unknown config key");
    }
    Ok(RunPlan {
        request: build_data_request(config)?,
        config: build_backtest_config(config)?,
        params: build_strategy_params(config, strategy)?,
        reports: build_report_paths(config),
    })
}

/// Fetch, export, run, summarise and write the configured artifacts.
pub fn run_pipeline(plan: &RunPlan, data_port: &dyn DataPort) -> Result<BacktestResult, CrossbtError> {
    let RunPlan {
        request,
        config,
        params,
        reports,
    } = plan;

    eprintln!(
        "Fetching {} from {} to {}...",
        request.ticker, request.start, request.end
    );
    let bars = data_port.fetch_bars(&request.ticker, request.start, request.end)?;
    eprintln!("  Loaded {} bars", bars.len());

    if let Some(path) = &reports.export_csv {
        export_bars(path, &bars)?;
        eprintln!("  Exported price history to {}", path.display());
    }

    let evaluator = CrossoverEvaluator::new(*params)?;
    eprintln!(
        "Running {} (lookback {} bars, fill at {})",
        evaluator.name(),
        evaluator.lookback(),
        config.execution
    );
    let result = run_backtest(&bars, &evaluator, config)?;

    print_summary(request, params, config.initial_cash, &result);

    let ctx = ReportContext {
        ticker: &request.ticker,
        start: request.start,
        end: request.end,
        initial_cash: config.initial_cash,
        params,
        bars: &bars,
        result: &result,
    };
    if let Some(path) = &reports.html {
        HtmlReportAdapter::new().write(&ctx, path)?;
        eprintln!("HTML report written to {}", path.display());
    }
    if let Some(path) = &reports.chart {
        SvgChartAdapter::new().write(&ctx, path)?;
        eprintln!("Chart written to {}", path.display());
    }

    Ok(result)
}

fn run_backtest_command(
    config_path: &Path,
    range: &RangeArgs,
    strategy: Option<StrategyKind>,
    html: Option<PathBuf>,
    chart: Option<PathBuf>,
) -> Result<(), CrossbtError> {
    let file = load_config(config_path)?;
    let config = LayeredConfig::new(&file).with_range(range);

    let source = build_data_source(&config)?;
    let mut plan = plan_run(&config, strategy)?;
    plan.reports.html = html.or(plan.reports.html);
    plan.reports.chart = chart.or(plan.reports.chart);

    let data_port = data_port_for(&source)?;
    run_pipeline(&plan, data_port.as_ref()).map(|_| ())
}

fn run_fetch(config_path: &Path, range: &RangeArgs, output: &Path) -> Result<(), CrossbtError> {
    let file = load_config(config_path)?;
    let config = LayeredConfig::new(&file).with_range(range);

    let source = build_data_source(&config)?;
    let request = build_data_request(&config)?;
    let data_port = data_port_for(&source)?;

    eprintln!(
        "Fetching {} from {} to {}...",
        request.ticker, request.start, request.end
    );
    let bars = data_port.fetch_bars(&request.ticker, request.start, request.end)?;
    export_bars(output, &bars)?;
    eprintln!("Wrote {} bars to {}", bars.len(), output.display());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), CrossbtError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;

    let source = build_data_source(&config)?;
    let request = build_data_request(&config)?;
    let bt = build_backtest_config(&config)?;
    let params = build_strategy_params(&config, None)?;

    eprintln!("Configuration is valid.\n");
    match &source {
        DataSource::Csv { dir } => eprintln!("Source:       csv ({})", dir.display()),
        DataSource::Yahoo => eprintln!("Source:       yahoo"),
    }
    eprintln!("Ticker:       {}", request.ticker);
    eprintln!("Period:       {} to {}", request.start, request.end);
    eprintln!("Initial Cash: {:.2}", bt.initial_cash);
    eprintln!("Fill Policy:  {}", bt.execution);
    eprintln!("Strategy:     {}", params);
    let indicators: Vec<String> = params.indicators().iter().map(|i| i.to_string()).collect();
    eprintln!("Indicators:   {}", indicators.join(", "));
    eprintln!("Lookback:     {} bars", params.lookback());
    eprintln!("\nParameter ranges:");
    for line in params.kind().describe_ranges() {
        eprintln!("  {}", line);
    }
    Ok(())
}

fn print_strategies() {
    for kind in StrategyKind::ALL {
        println!("{} ({})", kind, kind.key());
        for line in kind.describe_ranges() {
            println!("  {}", line);
        }
    }
}

fn print_summary(
    request: &DataRequest,
    params: &StrategyParams,
    initial_cash: f64,
    result: &BacktestResult,
) {
    let s = &result.statistics;
    eprintln!("\n=== Results: {} | {} ===", request.ticker, params);
    eprintln!("Starting Cash:    {:.2}", initial_cash);
    eprintln!("Final Value:      {:.2}", s.final_value);
    eprintln!("Total Return:     {:.2}%", s.total_return_pct);
    eprintln!("Sharpe Ratio:     {}", s.sharpe_display());
    eprintln!("Max Drawdown:     {:.2}%", s.max_drawdown_pct);
    eprintln!("Total Trades:     {}", s.total_trades);
    eprintln!("Won / Lost:       {} / {}", s.trades_won, s.trades_lost);
    eprintln!("Win Rate:         {:.1}%", s.win_rate_pct);
    eprintln!("Net P&L:          {:.2}", s.net_pnl);
    if let Some(position) = &result.open_position {
        eprintln!(
            "Open Position:    {} shares since {} at {:.2}",
            position.quantity, position.entry_date, position.entry_price
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backtest_with_overrides() {
        let cli = Cli::try_parse_from([
            "crossbt", "-v", "backtest", "-c", "run.ini", "--ticker", "msft", "--start",
            "2021-01-04", "--strategy", "macd", "--html", "out.html",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Backtest {
                config,
                range,
                strategy,
                html,
                chart,
            } => {
                assert_eq!(config, PathBuf::from("run.ini"));
                assert_eq!(range.ticker.as_deref(), Some("msft"));
                assert_eq!(range.start.as_deref(), Some("2021-01-04"));
                assert_eq!(range.end, None);
                assert_eq!(strategy, Some(StrategyKind::Macd));
                assert_eq!(html, Some(PathBuf::from("out.html")));
                assert_eq!(chart, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = Cli::try_parse_from(["crossbt", "backtest", "-c", "x.ini", "-s", "bollinger"]);
        assert!(err.is_err());
    }

    #[test]
    fn fetch_requires_output() {
        assert!(Cli::try_parse_from(["crossbt", "fetch", "-c", "x.ini"]).is_err());
        assert!(Cli::try_parse_from(["crossbt", "fetch", "-c", "x.ini", "-o", "a.csv"]).is_ok());
    }

    #[test]
    fn strategies_takes_no_arguments() {
        let cli = Cli::try_parse_from(["crossbt", "strategies"]).unwrap();
        assert!(matches!(cli.command, Command::Strategies));
        assert!(!cli.verbose);
    }

    #[test]
    fn layered_config_prefers_overrides() {
        let base = FileConfigAdapter::from_string(
            "[backtest]\nticker = AAPL\nstart_date = 2020-01-01\nend_date = 2020-12-31\n",
        )
        .unwrap();
        let range = RangeArgs {
            ticker: Some("ibm".into()),
            start: None,
            end: Some("2021-06-30".into()),
        };
        let layered = LayeredConfig::new(&base).with_range(&range);

        assert_eq!(layered.get_string("backtest", "ticker"), Some("ibm".into()));
        assert_eq!(
            layered.get_string("backtest", "start_date"),
            Some("2020-01-01".into())
        );
        assert_eq!(
            layered.get_string("backtest", "end_date"),
            Some("2021-06-30".into())
        );
        assert_eq!(layered.keys("backtest"), vec!["end_date", "start_date", "ticker"]);
    }

    #[test]
    fn layered_config_adds_missing_keys() {
        let base = FileConfigAdapter::from_string("[strategy]\ntype = sma\n").unwrap();
        let layered = LayeredConfig::new(&base).set("backtest", "ticker", Some("TSLA"));
        assert_eq!(layered.get_string("backtest", "ticker"), Some("TSLA".into()));
        assert_eq!(layered.keys("backtest"), vec!["ticker"]);
        assert_eq!(layered.get_string("strategy", "type"), Some("sma".into()));
    }

    #[cfg(not(feature = "yahoo"))]
    #[test]
    fn yahoo_without_feature_is_config_error() {
        let err = data_port_for(&DataSource::Yahoo).err().unwrap();
        assert!(matches!(err, CrossbtError::ConfigInvalid { key, .. } if key == "source"));
    }
}
