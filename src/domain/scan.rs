//! Multi-symbol scan orchestration.
//!
//! # Execution
//!
//! - One task per symbol in a `JoinSet`; a semaphore of `max_concurrency`
//!   permits is held only across the market-data fetch. Indicator math and
//!   condition evaluation run after the permit is released.
//! - Results are assembled once every task has finished. A timeout or
//!   cancellation drops the `JoinSet`, aborting in-flight fetches, and no
//!   partial list is returned.
//! - Fetch failures and malformed series land in `ScanReport::skipped`. A
//!   series too short for the strategy's warm-up is reported as not matched
//!   with `ScanNote::IndicatorsUnavailable`.
//! - Results are matched first, each group keeping universe order. Ranking
//!   presets return only their top `top_n` rows.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::domain::condition_eval::{Outcome, evaluate_all, resolve};
use crate::domain::error::ScreenerError;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::ohlcv::{OhlcvBar, SeriesError, validate_series};
use crate::domain::preset::{Preset, RankOrder};
use crate::domain::ranking::{RankedSymbol, percent_change, rank};
use crate::domain::scan_config::ScanConfig;
use crate::domain::strategy::Strategy;
use crate::domain::strategy_validation::validate_strategy;
use crate::domain::timeframe::Timeframe;
use crate::domain::universe::select_universe;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanTarget {
    /// Thresholds come from `ScanConfig::presets`.
    Preset(Preset),
    Custom(Strategy),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanNote {
    IndicatorsUnavailable { bars: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub symbol: String,
    pub exchange: String,
    pub matched: bool,
    pub current_price: Option<f64>,
    /// One outcome per strategy condition, in order. Empty for ranking presets.
    pub conditions: Vec<Outcome>,
    /// Named values in the strategy's output order; undefined readings omitted.
    pub indicator_values: Vec<(String, f64)>,
    pub note: Option<ScanNote>,
}

impl ScanResult {
    pub fn conditions_met(&self) -> usize {
        self.conditions.iter().filter(|o| o.passed()).count()
    }

    pub fn indicator_value(&self, name: &str) -> Option<f64> {
        self.indicator_values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("malformed series: {0}")]
    Malformed(SeriesError),

    #[error("{bars} bars, {required} required")]
    InsufficientBars { bars: usize, required: usize },

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanReport {
    pub strategy: String,
    pub results: Vec<ScanResult>,
    pub skipped: Vec<SkippedSymbol>,
    /// Requested codes outside the configured universe.
    pub excluded: Vec<String>,
}

impl ScanReport {
    pub fn matched(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|r| r.matched)
    }
}

/// What one symbol task does with its bars.
enum Evaluation {
    Filter(Strategy),
    Rank {
        order: RankOrder,
        days: usize,
        top_n: usize,
    },
}

struct ScanPlan {
    name: String,
    evaluation: Evaluation,
    timeframe: Timeframe,
    lookback_days: i64,
}

impl ScanPlan {
    fn new(target: &ScanTarget, config: &ScanConfig) -> Result<Self, ScreenerError> {
        match target {
            ScanTarget::Preset(preset) => {
                let params = &config.presets;
                if let Some(order) = preset.rank_order() {
                    let bars_needed = params.days.saturating_add(1);
                    return Ok(Self {
                        name: preset.as_str().to_string(),
                        evaluation: Evaluation::Rank {
                            order,
                            days: params.days,
                            top_n: params.top_n,
                        },
                        timeframe: Timeframe::Daily,
                        lookback_days: covering_lookback(
                            Timeframe::Daily,
                            preset.lookback_days(),
                            bars_needed,
                        ),
                    });
                }
                let strategy = preset.strategy(params).ok_or_else(|| {
                    ScreenerError::StrategyNotFound {
                        id: preset.as_str().to_string(),
                    }
                })?;
                validate_strategy(&strategy)?;
                Ok(Self {
                    name: preset.as_str().to_string(),
                    timeframe: strategy.timeframe,
                    lookback_days: covering_lookback(
                        strategy.timeframe,
                        preset.lookback_days(),
                        strategy.min_bars(),
                    ),
                    evaluation: Evaluation::Filter(strategy),
                })
            }
            ScanTarget::Custom(strategy) => {
                validate_strategy(strategy)?;
                Ok(Self {
                    name: strategy.name.clone(),
                    timeframe: strategy.timeframe,
                    lookback_days: covering_lookback(
                        strategy.timeframe,
                        strategy.timeframe.lookback_days(),
                        strategy.min_bars(),
                    ),
                    evaluation: Evaluation::Filter(strategy.clone()),
                })
            }
        }
    }
}

/// Widens `base` calendar days until it spans `bars` sessions of `timeframe`.
///
/// Daily bars assume five sessions a week plus a holiday margin. Intraday
/// lookbacks are left as configured.
fn covering_lookback(timeframe: Timeframe, base: i64, bars: usize) -> i64 {
    let bars = i64::try_from(bars).unwrap_or(i64::MAX);
    let needed = match timeframe {
        Timeframe::Daily => (bars.saturating_mul(7) / 5).saturating_add(14),
        Timeframe::Weekly => bars.saturating_mul(7).saturating_add(14),
        Timeframe::Monthly => bars.saturating_mul(31).saturating_add(31),
        _ => base,
    };
    base.max(needed)
}

fn fetch_start(end: NaiveDate, lookback_days: i64) -> Result<NaiveDate, ScreenerError> {
    chrono::Duration::try_days(lookback_days)
        .and_then(|span| end.checked_sub_signed(span))
        .ok_or_else(|| ScreenerError::ConfigInvalid {
            section: "scan".into(),
            key: "end_date".into(),
            reason: format!("a {} day lookback from {} is out of range", lookback_days, end),
        })
}

enum SymbolOutcome {
    Evaluated(ScanResult),
    Ranked(RankedSymbol),
    Skipped(SkipReason),
}

/// Runs a scan over `subset` (or the configured universe) to completion,
/// honouring `config.timeout`.
pub async fn run_scan(
    port: Arc<dyn MarketDataPort>,
    target: &ScanTarget,
    config: &ScanConfig,
    subset: Option<&[String]>,
) -> Result<ScanReport, ScreenerError> {
    run_scan_until(port, target, config, subset, std::future::pending()).await
}

/// As `run_scan`, but abandons the scan with `ScreenerError::Cancelled` as
/// soon as `cancel` resolves.
pub async fn run_scan_until<C>(
    port: Arc<dyn MarketDataPort>,
    target: &ScanTarget,
    config: &ScanConfig,
    subset: Option<&[String]>,
    cancel: C,
) -> Result<ScanReport, ScreenerError>
where
    C: Future<Output = ()>,
{
    let plan = Arc::new(ScanPlan::new(target, config)?);

    let selection = select_universe(&config.universe, subset);
    if !selection.excluded.is_empty() {
        warn!(
            excluded = ?selection.excluded,
            "requested codes are not in the configured universe"
        );
    }
    if selection.codes.is_empty() {
        return Err(ScreenerError::EmptyUniverse);
    }

    let end = config.end_date;
    let start = fetch_start(end, plan.lookback_days)?;
    info!(
        strategy = %plan.name,
        symbols = selection.codes.len(),
        timeframe = %plan.timeframe,
        %start,
        %end,
        max_concurrency = config.max_concurrency,
        "starting scan"
    );

    let work = scan_symbols(
        port,
        Arc::clone(&plan),
        &selection.codes,
        &config.exchange,
        config.max_concurrency,
        (start, end),
    );
    let bounded = with_deadline(work, config.timeout);

    let outcomes = tokio::select! {
        biased;
        _ = cancel => {
            warn!(strategy = %plan.name, "scan cancelled");
            return Err(ScreenerError::Cancelled);
        }
        outcomes = bounded => outcomes?,
    };

    let mut report = assemble(&plan, &selection.codes, &config.exchange, outcomes)?;
    report.excluded = selection.excluded;
    info!(
        strategy = %report.strategy,
        results = report.results.len(),
        matched = report.matched().count(),
        skipped = report.skipped.len(),
        "scan complete"
    );
    Ok(report)
}

async fn with_deadline<F, T>(work: F, limit: Option<Duration>) -> Result<T, ScreenerError>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            warn!(?limit, "scan deadline exceeded");
            ScreenerError::TimedOut(limit)
        }),
        None => Ok(work.await),
    }
}

/// Scans every code and returns outcomes in `codes` order. `None` marks a
/// task that panicked or was aborted.
async fn scan_symbols(
    port: Arc<dyn MarketDataPort>,
    plan: Arc<ScanPlan>,
    codes: &[String],
    exchange: &str,
    max_concurrency: usize,
    window: (NaiveDate, NaiveDate),
) -> Vec<Option<SymbolOutcome>> {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, code) in codes.iter().enumerate() {
        let port = Arc::clone(&port);
        let plan = Arc::clone(&plan);
        let permits = Arc::clone(&permits);
        let code = code.clone();
        let exchange = exchange.to_string();
        let span = info_span!("scan_symbol", symbol = %code);

        tasks.spawn(
            async move {
                let outcome = scan_symbol(port.as_ref(), &plan, &code, &exchange, &permits, window).await;
                (index, outcome)
            }
            .instrument(span),
        );
    }

    let mut outcomes: Vec<Option<SymbolOutcome>> = codes.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => warn!(error = %e, "symbol scan task failed"),
        }
    }
    outcomes
}

async fn scan_symbol(
    port: &dyn MarketDataPort,
    plan: &ScanPlan,
    code: &str,
    exchange: &str,
    permits: &Semaphore,
    (start, end): (NaiveDate, NaiveDate),
) -> SymbolOutcome {
    let fetched = {
        let _permit = match permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => return SymbolOutcome::Skipped(SkipReason::TaskFailed(e.to_string())),
        };
        port.fetch_bars(code, exchange, plan.timeframe, start, end)
            .await
    };

    let bars = match fetched {
        Ok(bars) => bars,
        Err(e) => {
            warn!(error = %e, "fetch failed, skipping symbol");
            return SymbolOutcome::Skipped(SkipReason::FetchFailed(e.to_string()));
        }
    };
    if let Err(e) = validate_series(&bars) {
        warn!(reason = %e, "malformed bar series, skipping symbol");
        return SymbolOutcome::Skipped(SkipReason::Malformed(e));
    }
    debug!(bars = bars.len(), "fetched bars");

    match &plan.evaluation {
        Evaluation::Filter(strategy) => {
            SymbolOutcome::Evaluated(evaluate_symbol(strategy, code, exchange, &bars))
        }
        Evaluation::Rank { days, .. } => match percent_change(&bars, *days) {
            Some(change_pct) => SymbolOutcome::Ranked(RankedSymbol {
                symbol: code.to_string(),
                current_price: last_close(&bars).unwrap_or_default(),
                change_pct,
            }),
            None => {
                let required = days.saturating_add(1);
                warn!(bars = bars.len(), required, "too few bars to rank");
                SymbolOutcome::Skipped(SkipReason::InsufficientBars {
                    bars: bars.len(),
                    required,
                })
            }
        },
    }
}

/// Evaluates a strategy at the latest bar of a validated series.
pub fn evaluate_symbol(
    strategy: &Strategy,
    code: &str,
    exchange: &str,
    bars: &[OhlcvBar],
) -> ScanResult {
    let required = strategy.min_bars();
    let current_price = last_close(bars);

    if bars.len() < required {
        debug!(bars = bars.len(), required, "not enough bars for indicators");
        return ScanResult {
            symbol: code.to_string(),
            exchange: exchange.to_string(),
            matched: false,
            current_price,
            conditions: vec![Outcome::NoData; strategy.conditions.len()],
            indicator_values: Vec::new(),
            note: Some(ScanNote::IndicatorsUnavailable {
                bars: bars.len(),
                required,
            }),
        };
    }

    let indicators = compute_indicators(bars, &strategy.required_indicators());
    let last = bars.len() - 1;
    let conditions = evaluate_all(&strategy.conditions, bars, &indicators, last);
    let matched = !conditions.is_empty() && conditions.iter().all(|o| o.passed());
    let indicator_values = strategy
        .outputs
        .iter()
        .filter_map(|output| {
            resolve(&output.operand, bars, &indicators, last)
                .value()
                .map(|v| (output.name.clone(), v))
        })
        .collect();

    ScanResult {
        symbol: code.to_string(),
        exchange: exchange.to_string(),
        matched,
        current_price,
        conditions,
        indicator_values,
        note: None,
    }
}

fn last_close(bars: &[OhlcvBar]) -> Option<f64> {
    bars.last().map(|b| b.close)
}

fn assemble(
    plan: &ScanPlan,
    codes: &[String],
    exchange: &str,
    outcomes: Vec<Option<SymbolOutcome>>,
) -> Result<ScanReport, ScreenerError> {
    let mut results = Vec::new();
    let mut ranked = Vec::new();
    let mut skipped = Vec::new();

    for (code, outcome) in codes.iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| {
            SymbolOutcome::Skipped(SkipReason::TaskFailed("task did not complete".into()))
        });
        match outcome {
            SymbolOutcome::Evaluated(result) => results.push(result),
            SymbolOutcome::Ranked(entry) => ranked.push(entry),
            SymbolOutcome::Skipped(reason) => skipped.push(SkippedSymbol {
                symbol: code.clone(),
                reason,
            }),
        }
    }

    let unreachable = skipped
        .iter()
        .filter(|s| {
            matches!(
                s.reason,
                SkipReason::FetchFailed(_) | SkipReason::TaskFailed(_)
            )
        })
        .count();
    if unreachable == codes.len() {
        return Err(ScreenerError::AllFetchesFailed {
            attempted: codes.len(),
        });
    }

    match plan.evaluation {
        Evaluation::Rank { order, top_n, .. } => {
            results = rank(ranked, order, top_n)
                .into_iter()
                .map(|entry| ScanResult {
                    symbol: entry.symbol,
                    exchange: exchange.to_string(),
                    matched: true,
                    current_price: Some(entry.current_price),
                    conditions: Vec::new(),
                    indicator_values: vec![("change_pct".to_string(), entry.change_pct)],
                    note: None,
                })
                .collect();
        }
        Evaluation::Filter(_) => results.sort_by_key(|r| !r.matched),
    }

    Ok(ScanReport {
        strategy: plan.name.clone(),
        results,
        skipped,
        excluded: Vec::new(),
    })
}
