//! SQLite persistence adapter for strategies, signals and forward configs.

use crate::domain::error::StratlabError;
use crate::domain::forward::SignalType;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{
    ForwardConfigRecord, InsertOutcome, NewSignal, SignalRecord, SignalStorePort, StrategyRecord,
};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratlabError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| StratlabError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("database", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| StratlabError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, StratlabError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| StratlabError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), StratlabError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS strategies (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                definition TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                strategy_id TEXT NOT NULL,
                t INTEGER NOT NULL,
                signal_type TEXT NOT NULL,
                price REAL NOT NULL,
                meta TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE (strategy_id, t, signal_type)
            );
            CREATE INDEX IF NOT EXISTS idx_signals_strategy_t ON signals(strategy_id, t DESC);
            CREATE TABLE IF NOT EXISTS forward_configs (
                strategy_id TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL DEFAULT 0,
                frequency_seconds INTEGER NOT NULL DEFAULT 300,
                last_checked_at INTEGER,
                last_error TEXT,
                updated_at INTEGER NOT NULL
            );",
        )
        .map_err(|e: rusqlite::Error| StratlabError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StratlabError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| StratlabError::Database {
                reason: e.to_string(),
            })
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn query_error(e: rusqlite::Error) -> StratlabError {
        StratlabError::DatabaseQuery {
            reason: e.to_string(),
        }
    }

    fn row_to_signal(row: &rusqlite::Row<'_>) -> rusqlite::Result<SignalRecord> {
        let type_str: String = row.get(3)?;
        let signal_type = SignalType::parse(&type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown signal type {type_str:?}").into(),
            )
        })?;
        let meta_str: Option<String> = row.get(5)?;
        let meta = meta_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(SignalRecord {
            id: row.get(0)?,
            strategy_id: row.get(1)?,
            t: row.get(2)?,
            signal_type,
            price: row.get(4)?,
            meta,
            created_at: row.get(6)?,
        })
    }

    fn row_to_forward_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForwardConfigRecord> {
        Ok(ForwardConfigRecord {
            strategy_id: row.get(0)?,
            enabled: row.get(1)?,
            frequency_seconds: row.get(2)?,
            last_checked_at: row.get(3)?,
            last_error: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

const SIGNAL_COLUMNS: &str = "id, strategy_id, t, signal_type, price, meta, created_at";
const FORWARD_COLUMNS: &str =
    "strategy_id, enabled, frequency_seconds, last_checked_at, last_error, updated_at";

impl SignalStorePort for SqliteStoreAdapter {
    fn put_strategy(&self, record: &StrategyRecord) -> Result<(), StratlabError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO strategies (id, name, symbol, timeframe, definition)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.name,
                record.symbol,
                record.timeframe,
                record.definition
            ],
        )
        .map_err(Self::query_error)?;
        Ok(())
    }

    fn get_strategy(&self, id: &str) -> Result<StrategyRecord, StratlabError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, symbol, timeframe, definition FROM strategies WHERE id = ?1",
            params![id],
            |row| {
                Ok(StrategyRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                    timeframe: row.get(3)?,
                    definition: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(Self::query_error)?
        .ok_or_else(|| StratlabError::StrategyNotFound { id: id.to_string() })
    }

    fn list_strategies(&self) -> Result<Vec<StrategyRecord>, StratlabError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, name, symbol, timeframe, definition FROM strategies ORDER BY id")
            .map_err(Self::query_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StrategyRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                    timeframe: row.get(3)?,
                    definition: row.get(4)?,
                })
            })
            .map_err(Self::query_error)?;

        let mut strategies = Vec::new();
        for row in rows {
            strategies.push(row.map_err(Self::query_error)?);
        }
        Ok(strategies)
    }

    fn insert_signal(&self, signal: &NewSignal) -> Result<InsertOutcome, StratlabError> {
        let conn = self.conn()?;
        let meta = serde_json::to_string(&signal.meta).map_err(|e| StratlabError::Database {
            reason: format!("meta serialization: {}", e),
        })?;

        // INSERT OR IGNORE leaves the row count at zero when the
        // (strategy, t, type) uniqueness constraint fires.
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO signals (strategy_id, t, signal_type, price, meta, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    signal.strategy_id,
                    signal.t,
                    signal.signal_type.as_str(),
                    signal.price,
                    meta,
                    Self::now_millis()
                ],
            )
            .map_err(Self::query_error)?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    fn latest_signal(&self, strategy_id: &str) -> Result<Option<SignalRecord>, StratlabError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {SIGNAL_COLUMNS} FROM signals WHERE strategy_id = ?1
                 ORDER BY t DESC, id DESC LIMIT 1"
            ),
            params![strategy_id],
            Self::row_to_signal,
        )
        .optional()
        .map_err(Self::query_error)
    }

    fn list_signals(&self, strategy_id: Option<&str>) -> Result<Vec<SignalRecord>, StratlabError> {
        let conn = self.conn()?;

        let (sql, bind): (String, Vec<&dyn rusqlite::ToSql>) = match strategy_id {
            Some(ref id) => (
                format!(
                    "SELECT {SIGNAL_COLUMNS} FROM signals WHERE strategy_id = ?1
                     ORDER BY t DESC, id DESC"
                ),
                vec![id as &dyn rusqlite::ToSql],
            ),
            None => (
                format!("SELECT {SIGNAL_COLUMNS} FROM signals ORDER BY t DESC, id DESC"),
                Vec::new(),
            ),
        };

        let mut stmt = conn.prepare(&sql).map_err(Self::query_error)?;
        let rows = stmt
            .query_map(&bind[..], Self::row_to_signal)
            .map_err(Self::query_error)?;

        let mut signals = Vec::new();
        for row in rows {
            signals.push(row.map_err(Self::query_error)?);
        }
        Ok(signals)
    }

    fn upsert_forward_config(
        &self,
        strategy_id: &str,
        enabled: bool,
        frequency_seconds: i64,
    ) -> Result<(), StratlabError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO forward_configs (strategy_id, enabled, frequency_seconds, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(strategy_id) DO UPDATE SET
                 enabled = excluded.enabled,
                 frequency_seconds = excluded.frequency_seconds,
                 updated_at = excluded.updated_at",
            params![strategy_id, enabled, frequency_seconds, Self::now_millis()],
        )
        .map_err(Self::query_error)?;
        Ok(())
    }

    fn get_forward_config(
        &self,
        strategy_id: &str,
    ) -> Result<Option<ForwardConfigRecord>, StratlabError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {FORWARD_COLUMNS} FROM forward_configs WHERE strategy_id = ?1"),
            params![strategy_id],
            Self::row_to_forward_config,
        )
        .optional()
        .map_err(Self::query_error)
    }

    fn list_enabled_forward_configs(&self) -> Result<Vec<ForwardConfigRecord>, StratlabError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {FORWARD_COLUMNS} FROM forward_configs WHERE enabled = 1 ORDER BY strategy_id"
            ))
            .map_err(Self::query_error)?;

        let rows = stmt
            .query_map([], Self::row_to_forward_config)
            .map_err(Self::query_error)?;

        let mut configs = Vec::new();
        for row in rows {
            configs.push(row.map_err(Self::query_error)?);
        }
        Ok(configs)
    }

    fn mark_checked(
        &self,
        strategy_id: &str,
        checked_at: i64,
        error: Option<&str>,
    ) -> Result<(), StratlabError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE forward_configs
             SET last_checked_at = ?2, last_error = ?3, updated_at = ?4
             WHERE strategy_id = ?1",
            params![strategy_id, checked_at, error, Self::now_millis()],
        )
        .map_err(Self::query_error)?;
        Ok(())
    }
}
