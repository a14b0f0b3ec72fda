//! CLI integration tests.
//!
//! Tests cover:
//! - Scan config construction with command-line overrides
//! - Strategy files (build_strategy)
//! - Data source selection
//! - Report and preset rendering
//! - Full commands over CSV files and a SQLite store on disk

mod common;

use clap::Parser;
use common::*;
use screener::adapters::file_config_adapter::FileConfigAdapter;
use screener::cli::{self, Cli, ScanScope};
use screener::domain::condition_eval::Outcome;
use screener::domain::error::ScreenerError;
use screener::domain::preset::PresetParams;
use screener::domain::scan::{ScanNote, ScanReport, ScanResult, SkipReason, SkippedSymbol};
use screener::domain::timeframe::Timeframe;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("screener").chain(args.iter().copied())).unwrap()
}

const STRATEGY_INI: &str = r#"
[strategy]
name = Golden Cross
description = SMA 20 crossing above SMA 50
timeframe = 1D
conditions = CROSS_ABOVE(SMA(20), SMA(50)); BETWEEN(RSI(14), 40, 70)
"#;

mod config_loading {
    use super::*;

    #[test]
    fn scope_overrides_config() {
        let adapter = FileConfigAdapter::from_string(
            "[scan]\nexchange = nse\ncodes = TCS\nend_date = 2024-01-31\ntimeout_secs = 60\n",
        )
        .unwrap();
        let scope = ScanScope {
            codes: None,
            timeout: Some(5),
            end_date: Some(date(2024, 2, 15)),
        };

        let config = cli::build_scan_config(&adapter, &scope).unwrap();
        assert_eq!(config.exchange, "NSE");
        assert_eq!(config.universe, codes(&["TCS"]));
        assert_eq!(config.end_date, date(2024, 2, 15));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let adapter = FileConfigAdapter::from_string("[scan]\nexchange = NSE\n").unwrap();
        let scope = ScanScope {
            timeout: Some(0),
            ..ScanScope::default()
        };
        let err = cli::build_scan_config(&adapter, &scope).unwrap_err();
        assert!(matches!(err, ScreenerError::ConfigInvalid { key, .. } if key == "timeout"));
    }

    #[test]
    fn preset_thresholds_from_config() {
        let adapter = FileConfigAdapter::from_string(
            "[scan]\nexchange = NSE\n[presets]\nmagnet_resistance_pct = 2.0\ndays = 14\n",
        )
        .unwrap();
        let config = cli::build_scan_config(&adapter, &ScanScope::default()).unwrap();
        assert_eq!(config.presets.magnet_resistance_pct, 2.0);
        assert_eq!(config.presets.days, 14);
        assert_eq!(config.presets.top_n, 20);
    }
}

mod strategy_parsing {
    use super::*;

    #[test]
    fn build_strategy_from_section() {
        let adapter = FileConfigAdapter::from_string(STRATEGY_INI).unwrap();
        let strategy = cli::build_strategy(&adapter).unwrap();

        assert_eq!(strategy.name, "Golden Cross");
        assert_eq!(strategy.timeframe, Timeframe::Daily);
        assert_eq!(strategy.conditions.len(), 2);
        assert_eq!(
            strategy.conditions_text(),
            "CROSS_ABOVE(SMA(20), SMA(50)); BETWEEN(RSI(14), 40, 70)"
        );
    }

    #[test]
    fn timeframe_defaults_to_daily() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nname = x\nconditions = ABOVE(close, 1)\n")
                .unwrap();
        assert_eq!(cli::build_strategy(&adapter).unwrap().timeframe, Timeframe::Daily);
    }

    #[test]
    fn missing_name_or_conditions() {
        let adapter = FileConfigAdapter::from_string("[strategy]\nconditions = ABOVE(close, 1)\n").unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(ScreenerError::ConfigMissing { key, .. }) if key == "name"
        ));

        let adapter = FileConfigAdapter::from_string("[strategy]\nname = x\n").unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(ScreenerError::ConfigMissing { key, .. }) if key == "conditions"
        ));
    }

    #[test]
    fn unknown_timeframe() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\nname = x\ntimeframe = 7m\nconditions = ABOVE(close, 1)\n",
        )
        .unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(ScreenerError::ConfigInvalid { key, .. }) if key == "timeframe"
        ));
    }

    #[test]
    fn parse_and_validation_errors() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nname = x\nconditions = ABOVE(SMA(20)\n")
                .unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(ScreenerError::ConditionParse(_))
        ));

        let adapter = FileConfigAdapter::from_string(
            "[strategy]\nname = x\nconditions = CROSS_ABOVE(RSI(14), 30)\n",
        )
        .unwrap();
        assert!(matches!(
            cli::build_strategy(&adapter),
            Err(ScreenerError::StrategyInvalid(_))
        ));
    }
}

mod data_source {
    use super::*;

    #[test]
    fn csv_requires_dir() {
        let adapter = FileConfigAdapter::from_string("[data]\nsource = csv\n").unwrap();
        assert!(matches!(
            cli::build_data_port(&adapter),
            Err(ScreenerError::ConfigMissing { section, .. }) if section == "csv"
        ));
    }

    #[test]
    fn unknown_source() {
        let adapter = FileConfigAdapter::from_string("[data]\nsource = postgres\n").unwrap();
        assert!(matches!(
            cli::build_data_port(&adapter),
            Err(ScreenerError::ConfigInvalid { key, .. }) if key == "source"
        ));
    }
}

mod rendering {
    use super::*;

    fn result(symbol: &str, matched: bool) -> ScanResult {
        ScanResult {
            symbol: symbol.to_string(),
            exchange: EXCHANGE.to_string(),
            matched,
            current_price: Some(102.95),
            conditions: vec![Outcome::Passed, Outcome::Failed, Outcome::NoData],
            indicator_values: vec![("ma44".to_string(), 101.875)],
            note: None,
        }
    }

    #[test]
    fn report_table() {
        let mut short = result("WIPRO", false);
        short.note = Some(ScanNote::IndicatorsUnavailable { bars: 10, required: 48 });
        let report = ScanReport {
            strategy: "MA44".to_string(),
            results: vec![result("TCS", true), short],
            skipped: vec![SkippedSymbol {
                symbol: "INFY".to_string(),
                reason: SkipReason::FetchFailed("timeout".to_string()),
            }],
            excluded: codes(&["XYZ"]),
        };

        let text = cli::format_report(&report);
        assert!(text.starts_with("MA44: 2 results, 1 matched, 1 skipped"));
        let tcs = text.lines().find(|l| l.starts_with("TCS")).unwrap();
        assert!(tcs.contains("yes"));
        assert!(tcs.contains("102.95"));
        assert!(tcs.contains("+-?"));
        assert!(tcs.contains("ma44=101.8750"));
        assert!(text.contains("indicators unavailable (10 bars, 48 required)"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("INFY") && l.ends_with("fetch failed: timeout")));
        assert!(text.contains("not in universe: XYZ"));
    }

    #[test]
    fn presets_listing_names_all_seven() {
        let text = cli::format_presets(&PresetParams::default());
        for name in [
            "MA44",
            "MA44_CROSS_MA200",
            "EMA_CROSSOVER",
            "DOWN_TO_MA200",
            "MAGNET_EFFECT",
            "TOP_GAINERS",
            "TOP_LOSERS",
        ] {
            assert!(text.contains(name), "{}", name);
        }
        assert!(text.contains("% change over 7 days, top 20"));
    }
}

mod commands {
    use super::*;

    fn write_csv(dir: &Path, code: &str, count: usize, start: f64, step: f64) {
        let mut content = String::from("timestamp,open,high,low,close,volume\n");
        for bar in linear_bars(code, count, start, step) {
            content.push_str(&format!(
                "{},{},{},{},{},{}\n",
                bar.timestamp.format("%Y-%m-%d"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            ));
        }
        std::fs::write(dir.join(format!("{}_{}.csv", code, EXCHANGE)), content).unwrap();
    }

    fn csv_setup() -> (tempfile::TempDir, tempfile::NamedTempFile) {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv(dir.path(), "TCS", 60, 100.0, 0.05);
        write_csv(dir.path(), "INFY", 60, 110.0, -0.05);
        let config = write_temp_ini(&format!(
            "[scan]\nexchange = {}\ncodes = TCS, INFY, WIPRO\nend_date = 2024-03-01\n\
             [data]\nsource = csv\n[csv]\ndir = {}\n",
            EXCHANGE,
            dir.path().display()
        ));
        (dir, config)
    }

    #[test]
    fn scan_preset_over_csv() {
        let (_dir, config) = csv_setup();
        let path = config.path().to_str().unwrap();
        // WIPRO has no file and is skipped; the scan still succeeds.
        let cli = parse(&["scan-preset", "ma44", "--config", path]);
        cli::execute(cli.command).unwrap();
    }

    #[test]
    fn scan_custom_strategy_file_with_subset() {
        let (_dir, config) = csv_setup();
        let strategy = write_temp_ini(STRATEGY_INI);
        let cli = parse(&[
            "scan",
            "--config",
            config.path().to_str().unwrap(),
            "--strategy",
            strategy.path().to_str().unwrap(),
            "--codes",
            "tcs",
        ]);
        cli::execute(cli.command).unwrap();
    }

    #[test]
    fn scan_with_every_fetch_failing() {
        let (_dir, config) = csv_setup();
        let cli = parse(&[
            "scan-preset",
            "TOP_GAINERS",
            "--config",
            config.path().to_str().unwrap(),
            "--codes",
            "WIPRO",
        ]);
        let err = cli::execute(cli.command).unwrap_err();
        assert!(matches!(err, ScreenerError::AllFetchesFailed { attempted: 1 }));
    }

    #[test]
    fn ranking_overrides_below_one_are_rejected() {
        let (_dir, config) = csv_setup();
        let path = config.path().to_str().unwrap();
        for (flag, key) in [("--days", "days"), ("--top-n", "top_n")] {
            let cli = parse(&["scan-preset", "TOP_GAINERS", "--config", path, flag, "0"]);
            assert!(matches!(
                cli::execute(cli.command),
                Err(ScreenerError::ConfigInvalid { key: k, .. }) if k == key
            ));
        }

        let mut overridden = scan_config(&["TCS"]);
        cli::apply_ranking_overrides(&mut overridden, Some(3), Some(5)).unwrap();
        assert_eq!((overridden.presets.days, overridden.presets.top_n), (3, 5));
        assert!(cli::apply_ranking_overrides(&mut overridden, Some(10_001), None).is_err());
    }

    #[test]
    fn unknown_preset_is_a_usage_error() {
        assert!(Cli::try_parse_from(["screener", "scan-preset", "MA45", "--config", "x.ini"]).is_err());
    }

    #[test]
    fn validate_strategy_file() {
        let strategy = write_temp_ini(STRATEGY_INI);
        let cli = parse(&["validate", "--strategy", strategy.path().to_str().unwrap()]);
        cli::execute(cli.command).unwrap();

        let bad = write_temp_ini("[strategy]\nname = x\nconditions = BETWEEN(close, 9, 1)\n");
        let cli = parse(&["validate", "--strategy", bad.path().to_str().unwrap()]);
        assert!(matches!(
            cli::execute(cli.command),
            Err(ScreenerError::StrategyInvalid(_))
        ));
    }

    #[test]
    fn missing_config_file() {
        let cli = parse(&["list-symbols", "--config", "/nonexistent/screener.ini"]);
        assert!(matches!(
            cli::execute(cli.command),
            Err(ScreenerError::ConfigParse { .. })
        ));
    }

    #[test]
    fn list_symbols_from_csv_dir() {
        let (_dir, config) = csv_setup();
        let cli = parse(&["list-symbols", "--config", config.path().to_str().unwrap()]);
        cli::execute(cli.command).unwrap();
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn strategy_store_round_trip() {
        use screener::adapters::sqlite_adapter::SqliteAdapter;
        use screener::ports::strategy_store_port::StrategyStore;

        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("screener.db");
        let config = write_temp_ini(&format!(
            "[scan]\nexchange = NSE\n[sqlite]\npath = {}\n",
            db.display()
        ));
        let config_path = config.path().to_str().unwrap();
        let strategy = write_temp_ini(STRATEGY_INI);

        let cli = parse(&[
            "strategies",
            "--config",
            config_path,
            "save",
            strategy.path().to_str().unwrap(),
        ]);
        cli::execute(cli.command).unwrap();

        let store = SqliteAdapter::from_config(&FileConfigAdapter::from_file(config.path()).unwrap()).unwrap();
        let stored = store.list().unwrap();
        assert_eq!(stored.len(), 1);
        let id = stored[0].id.clone().unwrap();

        cli::execute(parse(&["strategies", "--config", config_path, "show", &id]).command).unwrap();

        let revised = write_temp_ini(
            "[strategy]\nname = Golden Cross v2\nconditions = CROSS_ABOVE(EMA(10), EMA(30))\n",
        );
        let revised_path = revised.path().to_str().unwrap();
        cli::execute(
            parse(&["strategies", "--config", config_path, "update", &id, revised_path]).command,
        )
        .unwrap();
        let updated = store.get(&id).unwrap();
        assert_eq!(updated.name, "Golden Cross v2");
        assert_eq!(updated.conditions_text(), "CROSS_ABOVE(EMA(10), EMA(30))");
        assert!(matches!(
            cli::execute(
                parse(&["strategies", "--config", config_path, "update", "strategy_missing_1", revised_path])
                    .command
            ),
            Err(ScreenerError::StrategyNotFound { .. })
        ));

        cli::execute(parse(&["strategies", "--config", config_path, "delete", &id]).command).unwrap();
        assert!(matches!(
            cli::execute(parse(&["strategies", "--config", config_path, "show", &id]).command),
            Err(ScreenerError::StrategyNotFound { .. })
        ));
    }
}
