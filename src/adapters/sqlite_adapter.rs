//! SQLite adapter: bar storage for scans and the custom strategy store.

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use crate::domain::condition_parser::parse_conditions;
use crate::domain::error::ScreenerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::strategy::Strategy;
use crate::domain::strategy_validation::validate_strategy;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::strategy_store_port::StrategyStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type SqlitePool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct SqliteAdapter {
    pool: SqlitePool,
}

fn pool_error(e: r2d2::Error) -> ScreenerError {
    ScreenerError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> ScreenerError {
    ScreenerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScreenerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| ScreenerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    /// Single-connection in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self, ScreenerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn initialize_schema(&self) -> Result<(), ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                code TEXT NOT NULL,
                exchange TEXT NOT NULL,
                timeframe TEXT NOT NULL DEFAULT '1D',
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (code, exchange, timeframe, timestamp)
            );
            CREATE INDEX IF NOT EXISTS idx_ohlcv_exchange ON ohlcv(exchange);
            CREATE TABLE IF NOT EXISTS strategies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                timeframe TEXT NOT NULL,
                conditions TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_bars(&self, timeframe: Timeframe, bars: &[OhlcvBar]) -> Result<(), ScreenerError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv
                     (code, exchange, timeframe, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    bar.code,
                    bar.exchange,
                    timeframe.as_str(),
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn query_bars(
        &self,
        code: &str,
        exchange: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let start_str = format!("{} 00:00:00", start.format("%Y-%m-%d"));
        let end_str = format!("{} 23:59:59", end.format("%Y-%m-%d"));

        let mut stmt = conn
            .prepare(
                "SELECT code, exchange, timestamp, open, high, low, close, volume
                 FROM ohlcv
                 WHERE code = ?1 AND exchange = ?2 AND timeframe = ?3
                   AND timestamp >= ?4 AND timestamp <= ?5
                 ORDER BY timestamp ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![code, exchange, timeframe.as_str(), start_str, end_str],
                |row| {
                    let ts: String = row.get(2)?;
                    let timestamp =
                        NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?;
                    Ok(OhlcvBar {
                        code: row.get(0)?,
                        exchange: row.get(1)?,
                        timestamp,
                        open: row.get(3)?,
                        high: row.get(4)?,
                        low: row.get(5)?,
                        close: row.get(6)?,
                        volume: row.get(7)?,
                    })
                },
            )
            .map_err(query_error)?;

        let bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?;
        if bars.is_empty() {
            return Err(ScreenerError::NoData {
                code: code.to_string(),
                exchange: exchange.to_string(),
            });
        }
        Ok(bars)
    }

    fn query_symbols(&self, exchange: &str) -> Result<Vec<String>, ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT code FROM ohlcv WHERE exchange = ?1 ORDER BY code")
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![exchange], |row| row.get(0))
            .map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn create_at(&self, strategy: &Strategy, now: NaiveDateTime) -> Result<String, ScreenerError> {
        validate_strategy(strategy)?;
        let conn = self.pool.get().map_err(pool_error)?;

        let id = Self::next_strategy_id(&conn, now)?;
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        conn.execute(
            "INSERT INTO strategies
                 (id, name, description, timeframe, conditions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                strategy.name,
                strategy.description,
                strategy.timeframe.as_str(),
                strategy.conditions_text(),
                stamp
            ],
        )
        .map_err(query_error)?;

        Ok(id)
    }

    /// `strategy_YYYYMMDD_HHMMSS_n`, with `n` one past the highest suffix
    /// issued in the same second.
    fn next_strategy_id(
        conn: &rusqlite::Connection,
        now: NaiveDateTime,
    ) -> Result<String, ScreenerError> {
        let prefix = format!("strategy_{}", now.format("%Y%m%d_%H%M%S"));
        let highest: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(CAST(substr(id, length(?1) + 2) AS INTEGER)), 0)
                 FROM strategies WHERE id LIKE ?1 || '_%'",
                params![prefix],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(format!("{}_{}", prefix, highest + 1))
    }
}

fn row_to_strategy(
    id: String,
    name: String,
    description: String,
    timeframe: String,
    conditions: String,
) -> Result<Strategy, ScreenerError> {
    let timeframe: Timeframe = timeframe.parse().map_err(|e| ScreenerError::Database {
        reason: format!("strategy {}: {}", id, e),
    })?;
    let conditions = parse_conditions(&conditions)?;
    let mut strategy = Strategy::new(name, description, timeframe, conditions);
    strategy.id = Some(id);
    Ok(strategy)
}

type StrategyRow = (String, String, String, String, String);

fn read_strategy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StrategyRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

#[async_trait]
impl MarketDataPort for SqliteAdapter {
    async fn fetch_bars(
        &self,
        code: &str,
        exchange: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScreenerError> {
        let adapter = self.clone();
        let (code, exchange) = (code.to_string(), exchange.to_string());
        tokio::task::spawn_blocking(move || {
            adapter.query_bars(&code, &exchange, timeframe, start, end)
        })
        .await
        .map_err(|e| ScreenerError::Database {
            reason: e.to_string(),
        })?
    }

    async fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, ScreenerError> {
        let adapter = self.clone();
        let exchange = exchange.to_string();
        tokio::task::spawn_blocking(move || adapter.query_symbols(&exchange))
            .await
            .map_err(|e| ScreenerError::Database {
                reason: e.to_string(),
            })?
    }
}

impl StrategyStore for SqliteAdapter {
    fn create(&self, strategy: &Strategy) -> Result<String, ScreenerError> {
        self.create_at(strategy, Local::now().naive_local())
    }

    fn get(&self, id: &str) -> Result<Strategy, ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let row = conn
            .query_row(
                "SELECT id, name, description, timeframe, conditions
                 FROM strategies WHERE id = ?1",
                params![id],
                read_strategy_row,
            )
            .optional()
            .map_err(query_error)?
            .ok_or_else(|| ScreenerError::StrategyNotFound { id: id.to_string() })?;

        let (id, name, description, timeframe, conditions) = row;
        row_to_strategy(id, name, description, timeframe, conditions)
    }

    fn list(&self) -> Result<Vec<Strategy>, ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, description, timeframe, conditions
                 FROM strategies ORDER BY created_at ASC, id ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], read_strategy_row)
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        rows.into_iter()
            .map(|(id, name, description, timeframe, conditions)| {
                row_to_strategy(id, name, description, timeframe, conditions)
            })
            .collect()
    }

    fn update(&self, id: &str, strategy: &Strategy) -> Result<(), ScreenerError> {
        validate_strategy(strategy)?;
        let conn = self.pool.get().map_err(pool_error)?;
        let stamp = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
        let changed = conn
            .execute(
                "UPDATE strategies
                 SET name = ?2, description = ?3, timeframe = ?4, conditions = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![
                    id,
                    strategy.name,
                    strategy.description,
                    strategy.timeframe.as_str(),
                    strategy.conditions_text(),
                    stamp
                ],
            )
            .map_err(query_error)?;
        if changed == 0 {
            return Err(ScreenerError::StrategyNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), ScreenerError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let changed = conn
            .execute("DELETE FROM strategies WHERE id = ?1", params![id])
            .map_err(query_error)?;
        if changed == 0 {
            return Err(ScreenerError::StrategyNotFound { id: id.to_string() });
        }
        Ok(())
    }
}
