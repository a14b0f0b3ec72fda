//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::condition_eval::Outcome;
use crate::domain::condition_parser::parse_conditions;
use crate::domain::error::ScreenerError;
use crate::domain::preset::{Preset, PresetParams};
use crate::domain::scan::{ScanNote, ScanReport, ScanTarget, run_scan_until};
use crate::domain::scan_config::ScanConfig;
use crate::domain::strategy::Strategy;
use crate::domain::strategy_validation::{MAX_PERIOD, validate_strategy};
use crate::domain::timeframe::Timeframe;
use crate::domain::universe::parse_codes;
use crate::logging::{LogFormat, init_logging};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "screener", about = "Technical-analysis stock screener")]
pub struct Cli {
    /// Diagnostic log format on stderr
    #[arg(long, global = true, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the universe with a preset strategy
    ScanPreset {
        /// MA44, MA44_CROSS_MA200, EMA_CROSSOVER, DOWN_TO_MA200, MAGNET_EFFECT, TOP_GAINERS or TOP_LOSERS
        preset: Preset,
        #[arg(short, long)]
        config: PathBuf,
        /// Ranking window for TOP_GAINERS / TOP_LOSERS
        #[arg(long)]
        days: Option<usize>,
        #[arg(long)]
        top_n: Option<usize>,
        #[command(flatten)]
        scope: ScanScope,
    },
    /// Scan the universe with a custom strategy
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Strategy file with a [strategy] section
        #[arg(short, long, conflicts_with = "id", required_unless_present = "id")]
        strategy: Option<PathBuf>,
        /// Id of a stored strategy
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        scope: ScanScope,
    },
    /// List the preset strategies and their rules
    Presets {
        /// Read preset thresholds from this config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse and validate a strategy file
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Manage stored custom strategies
    Strategies {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        action: StrategyAction,
    },
    /// List available symbols on an exchange
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to [scan] exchange
        #[arg(long)]
        exchange: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ScanScope {
    /// Comma-separated subset of the configured universe
    #[arg(long)]
    pub codes: Option<String>,
    /// Abandon the scan after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Last day of the fetch window (defaults to [scan] end_date or today)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug)]
pub enum StrategyAction {
    List,
    Show { id: String },
    /// Validate a strategy file and store it
    Save { strategy: PathBuf },
    /// Replace a stored strategy with the contents of a strategy file
    Update { id: String, strategy: PathBuf },
    Delete { id: String },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.log_format);
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Runs one command; output goes to stdout, errors are returned.
pub fn execute(command: Command) -> Result<(), ScreenerError> {
    match command {
        Command::ScanPreset {
            preset,
            config,
            days,
            top_n,
            scope,
        } => {
            let adapter = load_config(&config)?;
            let mut scan_config = build_scan_config(&adapter, &scope)?;
            apply_ranking_overrides(&mut scan_config, days, top_n)?;
            let subset = parse_subset(&scope)?;
            let port = build_data_port(&adapter)?;
            let report = block_on_scan(port, ScanTarget::Preset(preset), scan_config, subset)?;
            print!("{}", format_report(&report));
            Ok(())
        }
        Command::Scan {
            config,
            strategy,
            id,
            scope,
        } => {
            let adapter = load_config(&config)?;
            let scan_config = build_scan_config(&adapter, &scope)?;
            let strategy = match (strategy, id) {
                (Some(path), _) => load_strategy_file(&path)?,
                (None, Some(id)) => load_stored_strategy(&adapter, &id)?,
                (None, None) => {
                    return Err(ScreenerError::ConfigMissing {
                        section: "strategy".into(),
                        key: "--strategy or --id".into(),
                    });
                }
            };
            let subset = parse_subset(&scope)?;
            let port = build_data_port(&adapter)?;
            let report = block_on_scan(port, ScanTarget::Custom(strategy), scan_config, subset)?;
            print!("{}", format_report(&report));
            Ok(())
        }
        Command::Presets { config } => {
            let params = match config {
                Some(path) => {
                    let adapter = load_config(&path)?;
                    build_scan_config(&adapter, &ScanScope::default())?.presets
                }
                None => PresetParams::default(),
            };
            print!("{}", format_presets(&params));
            Ok(())
        }
        Command::Validate { strategy } => {
            let strategy = load_strategy_file(&strategy)?;
            print!("{}", describe_strategy(&strategy));
            println!("\nStrategy is valid.");
            Ok(())
        }
        Command::Strategies { config, action } => {
            let adapter = load_config(&config)?;
            run_strategies(&adapter, action)
        }
        Command::ListSymbols { config, exchange } => {
            let adapter = load_config(&config)?;
            let exchange = match exchange {
                Some(e) => e.to_uppercase(),
                None => adapter
                    .get_string("scan", "exchange")
                    .map(|e| e.trim().to_uppercase())
                    .ok_or_else(|| ScreenerError::ConfigMissing {
                        section: "scan".into(),
                        key: "exchange".into(),
                    })?,
            };
            let port = build_data_port(&adapter)?;
            let symbols = runtime()?.block_on(port.list_symbols(&exchange))?;
            if symbols.is_empty() {
                info!(%exchange, "no symbols found");
            }
            for symbol in &symbols {
                println!("{}", symbol);
            }
            Ok(())
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ScreenerError> {
    FileConfigAdapter::from_file(path)
}

/// `[scan]`/`[presets]` from the config with command-line overrides applied.
pub fn build_scan_config(
    adapter: &dyn ConfigPort,
    scope: &ScanScope,
) -> Result<ScanConfig, ScreenerError> {
    let today = Local::now().date_naive();
    let mut config = ScanConfig::from_config(adapter, today)?;
    if let Some(end_date) = scope.end_date {
        config.end_date = end_date;
    }
    match scope.timeout {
        Some(0) => {
            return Err(ScreenerError::ConfigInvalid {
                section: "args".into(),
                key: "timeout".into(),
                reason: "timeout must be positive".into(),
            });
        }
        Some(secs) => config.timeout = Some(Duration::from_secs(secs)),
        None => {}
    }
    Ok(config)
}

/// `--days` / `--top-n`, held to the same bounds as `[presets]`.
pub fn apply_ranking_overrides(
    config: &mut ScanConfig,
    days: Option<usize>,
    top_n: Option<usize>,
) -> Result<(), ScreenerError> {
    let bounded = |key: &str, value: usize| {
        if (1..=MAX_PERIOD).contains(&value) {
            Ok(value)
        } else {
            Err(ScreenerError::ConfigInvalid {
                section: "args".into(),
                key: key.into(),
                reason: format!("{} must be between 1 and {}", key, MAX_PERIOD),
            })
        }
    };
    if let Some(days) = days {
        config.presets.days = bounded("days", days)?;
    }
    if let Some(top_n) = top_n {
        config.presets.top_n = bounded("top_n", top_n)?;
    }
    Ok(())
}

fn parse_subset(scope: &ScanScope) -> Result<Option<Vec<String>>, ScreenerError> {
    scope
        .codes
        .as_deref()
        .map(|codes| {
            parse_codes(codes).map_err(|e| ScreenerError::ConfigInvalid {
                section: "args".into(),
                key: "codes".into(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Picks the market-data adapter named by `[data] source` (default `csv`).
pub fn build_data_port(adapter: &dyn ConfigPort) -> Result<Arc<dyn MarketDataPort>, ScreenerError> {
    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .to_lowercase();

    match source.as_str() {
        "csv" => {
            let dir = adapter
                .get_string("csv", "dir")
                .ok_or_else(|| ScreenerError::ConfigMissing {
                    section: "csv".into(),
                    key: "dir".into(),
                })?;
            Ok(Arc::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let store = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(adapter)?;
            Ok(Arc::new(store))
        }
        other => Err(ScreenerError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{}'", other),
        }),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, ScreenerError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Runs a scan to completion; Ctrl-C cancels it.
fn block_on_scan(
    port: Arc<dyn MarketDataPort>,
    target: ScanTarget,
    config: ScanConfig,
    subset: Option<Vec<String>>,
) -> Result<ScanReport, ScreenerError> {
    runtime()?.block_on(async move {
        let interrupted = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        run_scan_until(port, &target, &config, subset.as_deref(), interrupted).await
    })
}

/// Builds a strategy from a `[strategy]` section: `name`, `description`,
/// `timeframe` (default `1D`) and `;`-separated `conditions`.
pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, ScreenerError> {
    let name = adapter
        .get_string("strategy", "name")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: "strategy".into(),
            key: "name".into(),
        })?;
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();
    let timeframe = match adapter.get_string("strategy", "timeframe") {
        Some(tf) => tf
            .trim()
            .parse::<Timeframe>()
            .map_err(|e| ScreenerError::ConfigInvalid {
                section: "strategy".into(),
                key: "timeframe".into(),
                reason: e.to_string(),
            })?,
        None => Timeframe::Daily,
    };
    let text = adapter
        .get_string("strategy", "conditions")
        .ok_or_else(|| ScreenerError::ConfigMissing {
            section: "strategy".into(),
            key: "conditions".into(),
        })?;

    let conditions = parse_conditions(&text).inspect_err(|e| {
        eprintln!(
            "error: failed to parse conditions:\n{}",
            e.display_with_context(&text)
        );
    })?;
    let strategy = Strategy::new(name, description, timeframe, conditions);
    validate_strategy(&strategy)?;
    Ok(strategy)
}

fn load_strategy_file(path: &Path) -> Result<Strategy, ScreenerError> {
    info!(path = %path.display(), "loading strategy");
    build_strategy(&load_config(path)?)
}

#[cfg(feature = "sqlite")]
fn load_stored_strategy(adapter: &dyn ConfigPort, id: &str) -> Result<Strategy, ScreenerError> {
    use crate::ports::strategy_store_port::StrategyStore;

    crate::adapters::sqlite_adapter::SqliteAdapter::from_config(adapter)?.get(id)
}

#[cfg(not(feature = "sqlite"))]
fn load_stored_strategy(_adapter: &dyn ConfigPort, id: &str) -> Result<Strategy, ScreenerError> {
    Err(ScreenerError::StrategyNotFound {
        id: format!("{} (sqlite feature is required for stored strategies)", id),
    })
}

#[cfg(feature = "sqlite")]
fn run_strategies(adapter: &dyn ConfigPort, action: StrategyAction) -> Result<(), ScreenerError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::ports::strategy_store_port::StrategyStore;

    let store = SqliteAdapter::from_config(adapter)?;
    match action {
        StrategyAction::List => {
            for strategy in store.list()? {
                println!(
                    "{:<28} {:<6} {}",
                    strategy.id.as_deref().unwrap_or("-"),
                    strategy.timeframe,
                    strategy.name
                );
            }
        }
        StrategyAction::Show { id } => {
            let strategy = store.get(&id)?;
            println!("id:          {}", id);
            print!("{}", describe_strategy(&strategy));
        }
        StrategyAction::Save { strategy } => {
            let strategy = load_strategy_file(&strategy)?;
            let id = store.create(&strategy)?;
            info!(%id, name = %strategy.name, "strategy saved");
            println!("{}", id);
        }
        StrategyAction::Update { id, strategy } => {
            let strategy = load_strategy_file(&strategy)?;
            store.update(&id, &strategy)?;
            info!(%id, name = %strategy.name, "strategy updated");
        }
        StrategyAction::Delete { id } => {
            store.delete(&id)?;
            info!(%id, "strategy deleted");
        }
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_strategies(_adapter: &dyn ConfigPort, _action: StrategyAction) -> Result<(), ScreenerError> {
    Err(ScreenerError::Database {
        reason: "sqlite feature is required for the strategy store".into(),
    })
}

pub fn describe_strategy(strategy: &Strategy) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name:        {}", strategy.name);
    if !strategy.description.is_empty() {
        let _ = writeln!(out, "description: {}", strategy.description);
    }
    let _ = writeln!(out, "timeframe:   {}", strategy.timeframe);
    let _ = writeln!(out, "min bars:    {}", strategy.min_bars());
    let _ = writeln!(out, "conditions:");
    for (i, condition) in strategy.conditions.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, condition);
    }
    let _ = writeln!(out, "indicators:");
    for indicator in strategy.required_indicators() {
        let _ = writeln!(out, "  {}", indicator);
    }
    out
}

pub fn format_presets(params: &PresetParams) -> String {
    let mut out = String::new();
    for preset in Preset::ALL {
        let _ = writeln!(out, "{:<18} {}", preset.as_str(), preset.description());
        match preset.strategy(params) {
            Some(strategy) => {
                for condition in &strategy.conditions {
                    let _ = writeln!(out, "{:<18}   {}", "", condition);
                }
            }
            None => {
                let _ = writeln!(
                    out,
                    "{:<18}   % change over {} days, top {}",
                    "", params.days, params.top_n
                );
            }
        }
    }
    out
}

fn outcome_marker(outcome: Outcome) -> char {
    match outcome {
        Outcome::Passed => '+',
        Outcome::Failed => '-',
        Outcome::NoData => '?',
    }
}

/// Renders a scan report as a plain-text table.
///
/// Condition markers: `+` pass, `-` fail, `?` no data.
pub fn format_report(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} results, {} matched, {} skipped",
        report.strategy,
        report.results.len(),
        report.matched().count(),
        report.skipped.len()
    );
    if report.results.is_empty() {
        let _ = writeln!(out, "no results");
    } else {
        let _ = writeln!(
            out,
            "{:<12} {:<5} {:>12}  {:<12} VALUES",
            "SYMBOL", "MATCH", "PRICE", "CONDITIONS"
        );
    }
    for result in &report.results {
        let price = result
            .current_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        let markers: String = result.conditions.iter().map(|o| outcome_marker(*o)).collect();
        let values = match &result.note {
            Some(ScanNote::IndicatorsUnavailable { bars, required }) => format!(
                "indicators unavailable ({} bars, {} required)",
                bars, required
            ),
            None => result
                .indicator_values
                .iter()
                .map(|(name, value)| format!("{}={:.4}", name, value))
                .collect::<Vec<_>>()
                .join(" "),
        };
        let _ = writeln!(
            out,
            "{:<12} {:<5} {:>12}  {:<12} {}",
            result.symbol,
            if result.matched { "yes" } else { "no" },
            price,
            markers,
            values
        );
    }
    if !report.skipped.is_empty() {
        let _ = writeln!(out, "skipped:");
        for skipped in &report.skipped {
            let _ = writeln!(out, "  {:<12} {}", skipped.symbol, skipped.reason);
        }
    }
    if !report.excluded.is_empty() {
        let _ = writeln!(out, "not in universe: {}", report.excluded.join(", "));
    }
    out
}
