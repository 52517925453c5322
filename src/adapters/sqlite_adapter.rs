//! SQLite persistence adapter.
//!
//! All SQL lives here; the rest of the crate talks to [`JournalPort`].

use std::collections::HashMap;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, types::ToSql, OptionalExtension};

use crate::domain::analytics::{
    compute_streaks, Analytics, DailyStat, DowStat, OverallStats, TagStat, TimeStat,
};
use crate::domain::error::JournalError;
use crate::domain::journal::{
    Day, DayFilter, DaySummary, FillRecord, LiveFilter, LiveTradeUpdate, NewLiveTrade, NewTrade,
    Portfolio, PortfolioSummary, TradeImage, TradeRecord,
};
use crate::domain::live::{LevelType, LiveExecution, LiveLevel, LiveTrade};
use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::JournalPort;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS portfolios (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL UNIQUE,
        description TEXT    NOT NULL DEFAULT '',
        color       TEXT    NOT NULL DEFAULT '#4fffb0',
        created_at  TEXT    NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS trading_days (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        date         TEXT    NOT NULL,
        portfolio_id INTEGER REFERENCES portfolios(id) ON DELETE SET NULL,
        imported_at  TEXT    NOT NULL DEFAULT (datetime('now')),
        UNIQUE(date, portfolio_id)
    );

    CREATE TABLE IF NOT EXISTS trades (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        day_id      INTEGER NOT NULL REFERENCES trading_days(id) ON DELETE CASCADE,
        trade_num   INTEGER NOT NULL,
        direction   TEXT    NOT NULL,
        qty         INTEGER NOT NULL,
        avg_entry   REAL    NOT NULL,
        avg_exit    REAL    NOT NULL,
        pnl         REAL    NOT NULL,
        entry_time  TEXT    NOT NULL,
        exit_time   TEXT    NOT NULL,
        is_open     INTEGER NOT NULL DEFAULT 0,
        notes       TEXT    NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS fills (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        trade_id  INTEGER NOT NULL REFERENCES trades(id) ON DELETE CASCADE,
        fill_time TEXT    NOT NULL,
        side      TEXT    NOT NULL,
        qty       INTEGER NOT NULL,
        price     REAL    NOT NULL
    );

    CREATE TABLE IF NOT EXISTS trade_tags (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        trade_id  INTEGER NOT NULL REFERENCES trades(id) ON DELETE CASCADE,
        group_id  TEXT    NOT NULL,
        tag       TEXT    NOT NULL,
        UNIQUE(trade_id, group_id, tag)
    );

    CREATE INDEX IF NOT EXISTS idx_trades_day     ON trades(day_id);
    CREATE INDEX IF NOT EXISTS idx_fills_trade    ON fills(trade_id);
    CREATE INDEX IF NOT EXISTS idx_tags_trade     ON trade_tags(trade_id);
    CREATE INDEX IF NOT EXISTS idx_tags_group     ON trade_tags(group_id);
    CREATE INDEX IF NOT EXISTS idx_days_date      ON trading_days(date);
    CREATE INDEX IF NOT EXISTS idx_days_portfolio ON trading_days(portfolio_id);

    CREATE TABLE IF NOT EXISTS tag_config (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id  TEXT    NOT NULL,
        tag       TEXT    NOT NULL,
        position  INTEGER NOT NULL DEFAULT 0,
        enabled   INTEGER NOT NULL DEFAULT 1,
        UNIQUE(group_id, tag)
    );

    CREATE TABLE IF NOT EXISTS trade_images (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        trade_id    INTEGER NOT NULL REFERENCES trades(id) ON DELETE CASCADE,
        filename    TEXT    NOT NULL,
        caption     TEXT    NOT NULL DEFAULT '',
        uploaded_at TEXT    NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_images_trade ON trade_images(trade_id);

    CREATE TABLE IF NOT EXISTS app_config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS live_trades (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        portfolio_id  INTEGER REFERENCES portfolios(id) ON DELETE SET NULL,
        status        TEXT    NOT NULL DEFAULT 'open',
        direction     TEXT    NOT NULL,
        instrument    TEXT    NOT NULL DEFAULT 'MES',
        entry_price   REAL    NOT NULL,
        entry_time    TEXT    NOT NULL,
        total_qty     INTEGER NOT NULL,
        mode          TEXT    NOT NULL DEFAULT 'full',
        notes         TEXT    NOT NULL DEFAULT '',
        tags_json     TEXT    NOT NULL DEFAULT '{}',
        created_at    TEXT    NOT NULL DEFAULT (datetime('now')),
        closed_at     TEXT,
        realized_pnl  REAL    NOT NULL DEFAULT 0,
        journal_trade_id INTEGER
    );

    CREATE TABLE IF NOT EXISTS live_trade_levels (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        live_trade_id INTEGER NOT NULL REFERENCES live_trades(id) ON DELETE CASCADE,
        level_type    TEXT    NOT NULL,
        portion       INTEGER NOT NULL DEFAULT 1,
        qty           INTEGER NOT NULL,
        price         REAL    NOT NULL,
        risk_dollars  REAL    NOT NULL DEFAULT 0,
        reward_dollars REAL   NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS live_trade_executions (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        live_trade_id INTEGER NOT NULL REFERENCES live_trades(id) ON DELETE CASCADE,
        exec_type     TEXT    NOT NULL,
        portion       INTEGER NOT NULL DEFAULT 1,
        qty           INTEGER NOT NULL,
        price         REAL    NOT NULL,
        exec_time     TEXT    NOT NULL,
        pnl           REAL    NOT NULL DEFAULT 0,
        created_at    TEXT    NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX IF NOT EXISTS idx_live_levels ON live_trade_levels(live_trade_id);
    CREATE INDEX IF NOT EXISTS idx_live_execs  ON live_trade_executions(live_trade_id);
";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> JournalError {
    JournalError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> JournalError {
    JournalError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn manager_init(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    // journal_mode returns a row, so it cannot go through execute_batch
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |r| r.get(0))?;
    Ok(())
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, JournalError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| JournalError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;
        let manager = SqliteConnectionManager::file(&db_path).with_init(manager_init);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    /// In-memory adapter for tests. Pool size 1 so every caller sees the
    /// same database.
    pub fn in_memory() -> Result<Self, JournalError> {
        let manager = SqliteConnectionManager::memory().with_init(manager_init);
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, JournalError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA).map_err(query_err)?;

        // Older databases predate the portfolio column on trading_days.
        let mut stmt = conn
            .prepare("PRAGMA table_info(trading_days)")
            .map_err(query_err)?;
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        if !cols.iter().any(|c| c == "portfolio_id") {
            conn.execute(
                "ALTER TABLE trading_days ADD COLUMN portfolio_id INTEGER \
                 REFERENCES portfolios(id) ON DELETE SET NULL",
                [],
            )
            .map_err(query_err)?;
        }

        Ok(())
    }
}

fn trade_tags_for(
    conn: &rusqlite::Connection,
    trade_id: i64,
) -> Result<std::collections::BTreeMap<String, Vec<String>>, JournalError> {
    let mut stmt = conn
        .prepare("SELECT group_id, tag FROM trade_tags WHERE trade_id = ?1")
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![trade_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(query_err)?;

    let mut tags: std::collections::BTreeMap<String, Vec<String>> = Default::default();
    for row in rows {
        let (group, tag) = row.map_err(query_err)?;
        tags.entry(group).or_default().push(tag);
    }
    Ok(tags)
}

fn fills_for(conn: &rusqlite::Connection, trade_id: i64) -> Result<Vec<FillRecord>, JournalError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, trade_id, fill_time, side, qty, price
             FROM fills WHERE trade_id = ?1 ORDER BY fill_time",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![trade_id], |row| {
            Ok(FillRecord {
                id: row.get(0)?,
                trade_id: row.get(1)?,
                fill_time: row.get(2)?,
                side: row.get(3)?,
                qty: row.get(4)?,
                price: row.get(5)?,
            })
        })
        .map_err(query_err)?;
    rows.collect::<Result<_, _>>().map_err(query_err)
}

fn images_for(conn: &rusqlite::Connection, trade_id: i64) -> Result<Vec<TradeImage>, JournalError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, trade_id, filename, caption, uploaded_at
             FROM trade_images WHERE trade_id = ?1 ORDER BY uploaded_at",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![trade_id], |row| {
            Ok(TradeImage {
                id: row.get(0)?,
                trade_id: row.get(1)?,
                filename: row.get(2)?,
                caption: row.get(3)?,
                uploaded_at: row.get(4)?,
            })
        })
        .map_err(query_err)?;
    rows.collect::<Result<_, _>>().map_err(query_err)
}

fn map_trade_row(row: &rusqlite::Row<'_>) -> Result<TradeRecord, rusqlite::Error> {
    Ok(TradeRecord {
        id: row.get("id")?,
        day_id: row.get("day_id")?,
        trade_num: row.get("trade_num")?,
        direction: row.get("direction")?,
        qty: row.get("qty")?,
        avg_entry: row.get("avg_entry")?,
        avg_exit: row.get("avg_exit")?,
        pnl: row.get("pnl")?,
        entry_time: row.get("entry_time")?,
        exit_time: row.get("exit_time")?,
        is_open: row.get::<_, i64>("is_open")? != 0,
        notes: row.get("notes")?,
        fills: Vec::new(),
        tags: Default::default(),
        images: Vec::new(),
        date: None,
        portfolio_id: None,
        portfolio_name: None,
        portfolio_color: None,
    })
}

fn map_live_row(row: &rusqlite::Row<'_>) -> Result<LiveTrade, rusqlite::Error> {
    Ok(LiveTrade {
        id: row.get("id")?,
        portfolio_id: row.get("portfolio_id")?,
        portfolio_name: row.get("portfolio_name")?,
        portfolio_color: row.get("portfolio_color")?,
        status: row.get("status")?,
        direction: row.get("direction")?,
        instrument: row.get("instrument")?,
        entry_price: row.get("entry_price")?,
        entry_time: row.get("entry_time")?,
        total_qty: row.get("total_qty")?,
        mode: row.get("mode")?,
        notes: row.get("notes")?,
        tags_json: row.get("tags_json")?,
        created_at: row.get("created_at")?,
        closed_at: row.get("closed_at")?,
        realized_pnl: row.get("realized_pnl")?,
        journal_trade_id: row.get("journal_trade_id")?,
        levels: Vec::new(),
        executions: Vec::new(),
    })
}

fn live_levels_for(
    conn: &rusqlite::Connection,
    live_id: i64,
) -> Result<Vec<LiveLevel>, JournalError> {
    let mut stmt = conn
        .prepare(
            "SELECT level_type, portion, qty, price, risk_dollars, reward_dollars
             FROM live_trade_levels WHERE live_trade_id = ?1
             ORDER BY level_type, portion",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![live_id], |row| {
            let kind: String = row.get(0)?;
            Ok(LiveLevel {
                level_type: LevelType::parse(&kind).unwrap_or(LevelType::Stop),
                portion: row.get(1)?,
                qty: row.get(2)?,
                price: row.get(3)?,
                risk_dollars: row.get(4)?,
                reward_dollars: row.get(5)?,
            })
        })
        .map_err(query_err)?;
    rows.collect::<Result<_, _>>().map_err(query_err)
}

fn live_executions_for(
    conn: &rusqlite::Connection,
    live_id: i64,
) -> Result<Vec<LiveExecution>, JournalError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, exec_type, portion, qty, price, exec_time, pnl
             FROM live_trade_executions WHERE live_trade_id = ?1
             ORDER BY created_at, id",
        )
        .map_err(query_err)?;
    let rows = stmt
        .query_map(params![live_id], |row| {
            Ok(LiveExecution {
                id: row.get(0)?,
                exec_type: row.get(1)?,
                portion: row.get(2)?,
                qty: row.get(3)?,
                price: row.get(4)?,
                exec_time: row.get(5)?,
                pnl: row.get(6)?,
            })
        })
        .map_err(query_err)?;
    rows.collect::<Result<_, _>>().map_err(query_err)
}

/// Render a SQLite value as a SQL literal for dump output.
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => {
            let s = String::from_utf8_lossy(t);
            format!("'{}'", s.replace('\'', "''"))
        }
        ValueRef::Blob(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
            format!("X'{hex}'")
        }
    }
}

impl JournalPort for SqliteAdapter {
    // ── Portfolios ──────────────────────────────────────────────────────

    fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>, JournalError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.name, p.description, p.color, p.created_at,
                        COUNT(DISTINCT d.id)  as day_count,
                        COUNT(t.id)           as trade_count,
                        ROUND(SUM(t.pnl), 2)  as total_pnl
                 FROM portfolios p
                 LEFT JOIN trading_days d ON d.portfolio_id = p.id
                 LEFT JOIN trades t       ON t.day_id = d.id
                 GROUP BY p.id
                 ORDER BY p.name",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PortfolioSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    color: row.get(3)?,
                    created_at: row.get(4)?,
                    day_count: row.get(5)?,
                    trade_count: row.get(6)?,
                    total_pnl: row.get(7)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<_, _>>().map_err(query_err)
    }

    fn get_portfolio(&self, id: i64) -> Result<Option<Portfolio>, JournalError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, description, color, created_at FROM portfolios WHERE id = ?1",
            params![id],
            |row| {
                Ok(Portfolio {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    color: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn create_portfolio(
        &self,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO portfolios (name, description, color) VALUES (?1, ?2, ?3)",
            params![name.trim(), description.trim(), color],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn update_portfolio(
        &self,
        id: i64,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE portfolios SET name = ?1, description = ?2, color = ?3 WHERE id = ?4",
            params![name.trim(), description.trim(), color, id],
        )
        .map_err(query_err)?;
        Ok(())
    }

    /// Deletes the portfolio; its days are kept with portfolio_id NULL.
    fn delete_portfolio(&self, id: i64) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM portfolios WHERE id = ?1", params![id])
            .map_err(query_err)?;
        Ok(())
    }

    // ── Trading days ────────────────────────────────────────────────────

    fn list_days(&self, filter: &DayFilter) -> Result<Vec<DaySummary>, JournalError> {
        let conn = self.conn()?;

        let mut wheres: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(from) = &filter.date_from {
            wheres.push("d.date >= ?");
            values.push(Box::new(from.clone()));
        }
        if let Some(to) = &filter.date_to {
            wheres.push("d.date <= ?");
            values.push(Box::new(to.clone()));
        }
        if let Some(pid) = filter.portfolio_id {
            wheres.push("d.portfolio_id = ?");
            values.push(Box::new(pid));
        }
        let where_sql = if wheres.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", wheres.join(" AND "))
        };

        let sql = format!(
            "SELECT d.id, d.date, d.imported_at, d.portfolio_id,
                    p.name  as portfolio_name,
                    p.color as portfolio_color,
                    COUNT(t.id)  as trade_count,
                    ROUND(SUM(t.pnl), 2) as total_pnl,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) as wins
             FROM trading_days d
             LEFT JOIN portfolios p ON p.id = d.portfolio_id
             LEFT JOIN trades t     ON t.day_id = d.id
             {where_sql}
             GROUP BY d.id
             ORDER BY d.date DESC"
        );

        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                Ok(DaySummary {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    imported_at: row.get(2)?,
                    portfolio_id: row.get(3)?,
                    portfolio_name: row.get(4)?,
                    portfolio_color: row.get(5)?,
                    trade_count: row.get(6)?,
                    total_pnl: row.get(7)?,
                    wins: row.get(8)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<_, _>>().map_err(query_err)
    }

    fn get_day(&self, id: i64) -> Result<Option<Day>, JournalError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT d.id, d.date, d.imported_at, d.portfolio_id,
                    p.name as portfolio_name, p.color as portfolio_color
             FROM trading_days d
             LEFT JOIN portfolios p ON p.id = d.portfolio_id
             WHERE d.id = ?1",
            params![id],
            |row| {
                Ok(Day {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    imported_at: row.get(2)?,
                    portfolio_id: row.get(3)?,
                    portfolio_name: row.get(4)?,
                    portfolio_color: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn get_day_by_date(&self, date: &str) -> Result<Option<Day>, JournalError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT d.id, d.date, d.imported_at, d.portfolio_id,
                    p.name as portfolio_name, p.color as portfolio_color
             FROM trading_days d
             LEFT JOIN portfolios p ON p.id = d.portfolio_id
             WHERE d.date = ?1
             ORDER BY d.id LIMIT 1",
            params![date],
            |row| {
                Ok(Day {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    imported_at: row.get(2)?,
                    portfolio_id: row.get(3)?,
                    portfolio_name: row.get(4)?,
                    portfolio_color: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn find_day(&self, date: &str, portfolio_id: Option<i64>) -> Result<Option<i64>, JournalError> {
        let conn = self.conn()?;
        let result = match portfolio_id {
            Some(pid) => conn
                .query_row(
                    "SELECT id FROM trading_days WHERE date = ?1 AND portfolio_id = ?2",
                    params![date, pid],
                    |row| row.get(0),
                )
                .optional(),
            None => conn
                .query_row(
                    "SELECT id FROM trading_days WHERE date = ?1 AND portfolio_id IS NULL",
                    params![date],
                    |row| row.get(0),
                )
                .optional(),
        };
        result.map_err(query_err)
    }

    fn upsert_day(&self, date: &str, portfolio_id: Option<i64>) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO trading_days (date, portfolio_id) VALUES (?1, ?2)",
            params![date, portfolio_id],
        )
        .map_err(query_err)?;
        drop(conn);
        self.find_day(date, portfolio_id)?
            .ok_or_else(|| JournalError::DatabaseQuery {
                reason: format!("failed to upsert trading day {date}"),
            })
    }

    fn delete_day(&self, id: i64) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM trading_days WHERE id = ?1", params![id])
            .map_err(query_err)?;
        Ok(())
    }

    // ── Trades ──────────────────────────────────────────────────────────

    fn trades_for_day(&self, day_id: i64) -> Result<Vec<TradeRecord>, JournalError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT * FROM trades WHERE day_id = ?1 ORDER BY trade_num")
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![day_id], map_trade_row)
            .map_err(query_err)?;
        let mut trades: Vec<TradeRecord> = rows.collect::<Result<_, _>>().map_err(query_err)?;
        drop(stmt);

        for t in &mut trades {
            t.fills = fills_for(&conn, t.id)?;
            t.tags = trade_tags_for(&conn, t.id)?;
            t.images = images_for(&conn, t.id)?;
        }
        Ok(trades)
    }

    fn get_trade(&self, id: i64) -> Result<Option<TradeRecord>, JournalError> {
        let conn = self.conn()?;
        let trade = conn
            .query_row("SELECT * FROM trades WHERE id = ?1", params![id], map_trade_row)
            .optional()
            .map_err(query_err)?;
        let Some(mut trade) = trade else {
            return Ok(None);
        };

        trade.fills = fills_for(&conn, id)?;
        trade.tags = trade_tags_for(&conn, id)?;
        trade.images = images_for(&conn, id)?;

        let day = conn
            .query_row(
                "SELECT d.date, d.portfolio_id,
                        p.name as portfolio_name, p.color as portfolio_color
                 FROM trading_days d
                 LEFT JOIN portfolios p ON p.id = d.portfolio_id
                 WHERE d.id = ?1",
                params![trade.day_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(query_err)?;
        if let Some((date, pid, pname, pcolor)) = day {
            trade.date = Some(date);
            trade.portfolio_id = pid;
            trade.portfolio_name = pname;
            trade.portfolio_color = pcolor;
        }

        Ok(Some(trade))
    }

    fn insert_trade(&self, day_id: i64, trade: &NewTrade) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trades
                 (day_id, trade_num, direction, qty, avg_entry, avg_exit, pnl,
                  entry_time, exit_time, is_open)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                day_id,
                trade.trade_num,
                trade.direction,
                trade.qty,
                trade.avg_entry,
                trade.avg_exit,
                trade.pnl,
                trade.entry_time,
                trade.exit_time,
                trade.is_open as i64,
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_fill(
        &self,
        trade_id: i64,
        fill_time: &str,
        side: &str,
        qty: i64,
        price: f64,
    ) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO fills (trade_id, fill_time, side, qty, price)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![trade_id, fill_time, side, qty, price],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn fills_for_trade(&self, trade_id: i64) -> Result<Vec<FillRecord>, JournalError> {
        let conn = self.conn()?;
        fills_for(&conn, trade_id)
    }

    fn update_trade_notes(&self, trade_id: i64, notes: &str) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE trades SET notes = ?1 WHERE id = ?2",
            params![notes, trade_id],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn set_trade_tags(
        &self,
        trade_id: i64,
        group_id: &str,
        tags: &[String],
    ) -> Result<(), JournalError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "DELETE FROM trade_tags WHERE trade_id = ?1 AND group_id = ?2",
            params![trade_id, group_id],
        )
        .map_err(query_err)?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO trade_tags (trade_id, group_id, tag) VALUES (?1, ?2, ?3)",
                params![trade_id, group_id, tag],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn next_trade_num(&self, day_id: i64) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COALESCE(MAX(trade_num), 0) + 1 FROM trades WHERE day_id = ?1",
            params![day_id],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    // ── Trade images ────────────────────────────────────────────────────

    fn add_trade_image(
        &self,
        trade_id: i64,
        filename: &str,
        caption: &str,
    ) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trade_images (trade_id, filename, caption) VALUES (?1, ?2, ?3)",
            params![trade_id, filename, caption],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn trade_images(&self, trade_id: i64) -> Result<Vec<TradeImage>, JournalError> {
        let conn = self.conn()?;
        images_for(&conn, trade_id)
    }

    fn update_image_caption(&self, image_id: i64, caption: &str) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE trade_images SET caption = ?1 WHERE id = ?2",
            params![caption, image_id],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn delete_trade_image(&self, image_id: i64) -> Result<Option<String>, JournalError> {
        let conn = self.conn()?;
        let filename: Option<String> = conn
            .query_row(
                "SELECT filename FROM trade_images WHERE id = ?1",
                params![image_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        conn.execute("DELETE FROM trade_images WHERE id = ?1", params![image_id])
            .map_err(query_err)?;
        Ok(filename)
    }

    // ── Tag configuration ───────────────────────────────────────────────

    fn tag_overrides(&self) -> Result<Option<HashMap<String, Vec<String>>>, JournalError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT group_id, tag FROM tag_config
                 WHERE enabled = 1 ORDER BY group_id, position",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(query_err)?;

        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (group, tag) = row.map_err(query_err)?;
            result.entry(group).or_default().push(tag);
        }
        Ok(if result.is_empty() { None } else { Some(result) })
    }

    fn save_tag_override(&self, group_id: &str, tags: &[String]) -> Result<(), JournalError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM tag_config WHERE group_id = ?1", params![group_id])
            .map_err(query_err)?;
        for (i, tag) in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO tag_config (group_id, tag, position, enabled)
                 VALUES (?1, ?2, ?3, 1)",
                params![group_id, tag, i as i64],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn reset_tag_override(&self, group_id: &str) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM tag_config WHERE group_id = ?1", params![group_id])
            .map_err(query_err)?;
        Ok(())
    }

    // ── App configuration ───────────────────────────────────────────────

    fn get_setting(&self, key: &str) -> Result<Option<String>, JournalError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT value FROM app_config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn all_settings(&self) -> Result<HashMap<String, String>, JournalError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM app_config")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(query_err)?;
        rows.collect::<Result<_, _>>().map_err(query_err)
    }

    // ── Live trades ─────────────────────────────────────────────────────

    fn create_live_trade(&self, trade: &NewLiveTrade) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO live_trades
                 (portfolio_id, direction, instrument, entry_price, entry_time,
                  total_qty, mode, notes, tags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                trade.portfolio_id,
                trade.direction,
                trade.instrument,
                trade.entry_price,
                trade.entry_time,
                trade.total_qty,
                trade.mode,
                trade.notes,
                trade.tags_json,
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn get_live_trade(&self, id: i64) -> Result<Option<LiveTrade>, JournalError> {
        let conn = self.conn()?;
        let trade = conn
            .query_row(
                "SELECT lt.*, p.name as portfolio_name, p.color as portfolio_color
                 FROM live_trades lt
                 LEFT JOIN portfolios p ON p.id = lt.portfolio_id
                 WHERE lt.id = ?1",
                params![id],
                map_live_row,
            )
            .optional()
            .map_err(query_err)?;
        let Some(mut trade) = trade else {
            return Ok(None);
        };
        trade.levels = live_levels_for(&conn, id)?;
        trade.executions = live_executions_for(&conn, id)?;
        Ok(Some(trade))
    }

    fn list_live_trades(&self, filter: &LiveFilter) -> Result<Vec<LiveTrade>, JournalError> {
        let conn = self.conn()?;

        let mut wheres: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(status) = &filter.status {
            wheres.push("lt.status = ?");
            values.push(Box::new(status.clone()));
        }
        if let Some(from) = &filter.date_from {
            wheres.push("date(lt.created_at, 'localtime') >= ?");
            values.push(Box::new(from.clone()));
        }
        if let Some(to) = &filter.date_to {
            wheres.push("date(lt.created_at, 'localtime') <= ?");
            values.push(Box::new(to.clone()));
        }
        let where_sql = if wheres.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", wheres.join(" AND "))
        };

        let sql = format!(
            "SELECT lt.*, p.name as portfolio_name, p.color as portfolio_color
             FROM live_trades lt
             LEFT JOIN portfolios p ON p.id = lt.portfolio_id
             {where_sql}
             ORDER BY lt.created_at DESC, lt.id DESC"
        );

        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), map_live_row)
            .map_err(query_err)?;
        let mut trades: Vec<LiveTrade> = rows.collect::<Result<_, _>>().map_err(query_err)?;
        drop(stmt);

        for t in &mut trades {
            t.levels = live_levels_for(&conn, t.id)?;
            t.executions = live_executions_for(&conn, t.id)?;
        }
        Ok(trades)
    }

    fn update_live_trade(&self, id: i64, update: &LiveTradeUpdate) -> Result<(), JournalError> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = &update.status {
            sets.push("status = ?");
            values.push(Box::new(status.clone()));
        }
        if let Some(notes) = &update.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        if let Some(tags_json) = &update.tags_json {
            sets.push("tags_json = ?");
            values.push(Box::new(tags_json.clone()));
        }
        if let Some(closed_at) = &update.closed_at {
            sets.push("closed_at = ?");
            values.push(Box::new(closed_at.clone()));
        }
        if let Some(pnl) = update.realized_pnl {
            sets.push("realized_pnl = ?");
            values.push(Box::new(pnl));
        }
        if let Some(journal_id) = &update.journal_trade_id {
            sets.push("journal_trade_id = ?");
            values.push(Box::new(*journal_id));
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(Box::new(id));

        let sql = format!("UPDATE live_trades SET {} WHERE id = ?", sets.join(", "));
        let conn = self.conn()?;
        conn.execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
            .map_err(query_err)?;
        Ok(())
    }

    fn delete_live_trade(&self, id: i64) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM live_trades WHERE id = ?1", params![id])
            .map_err(query_err)?;
        Ok(())
    }

    fn set_live_levels(&self, live_id: i64, levels: &[LiveLevel]) -> Result<(), JournalError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "DELETE FROM live_trade_levels WHERE live_trade_id = ?1",
            params![live_id],
        )
        .map_err(query_err)?;
        for lv in levels {
            tx.execute(
                "INSERT INTO live_trade_levels
                     (live_trade_id, level_type, portion, qty, price, risk_dollars, reward_dollars)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    live_id,
                    lv.level_type.as_str(),
                    lv.portion,
                    lv.qty,
                    lv.price,
                    lv.risk_dollars,
                    lv.reward_dollars,
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    fn add_live_execution(
        &self,
        live_id: i64,
        execution: &LiveExecution,
    ) -> Result<i64, JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO live_trade_executions
                 (live_trade_id, exec_type, portion, qty, price, exec_time, pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                live_id,
                execution.exec_type,
                execution.portion,
                execution.qty,
                execution.price,
                execution.exec_time,
                execution.pnl,
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_live_execution(&self, exec_id: i64) -> Result<(), JournalError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM live_trade_executions WHERE id = ?1",
            params![exec_id],
        )
        .map_err(query_err)?;
        Ok(())
    }

    // ── Analytics ───────────────────────────────────────────────────────

    fn analytics(&self, portfolio_id: Option<i64>) -> Result<Analytics, JournalError> {
        let conn = self.conn()?;

        let (filter_and, filter_where) = match portfolio_id {
            Some(_) => ("AND d.portfolio_id = ?1", "WHERE d.portfolio_id = ?1"),
            None => ("", ""),
        };
        let bind = |values: &mut Vec<Box<dyn ToSql>>| {
            if let Some(pid) = portfolio_id {
                values.push(Box::new(pid));
            }
        };

        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let bound = params_from_iter(values.iter().map(|v| v.as_ref()));

        let sql = format!(
            "SELECT tt.group_id, tt.tag,
                    COUNT(t.id) AS total,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) AS wins,
                    ROUND(AVG(t.pnl), 2)  AS avg_pnl,
                    ROUND(SUM(t.pnl), 2)  AS total_pnl,
                    ROUND(100.0 * SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) / COUNT(t.id), 1)
                        AS win_rate
             FROM trade_tags tt
             JOIN trades t        ON t.id = tt.trade_id
             JOIN trading_days d  ON d.id = t.day_id
             WHERE 1=1 {filter_and}
             GROUP BY tt.group_id, tt.tag
             ORDER BY tt.group_id, avg_pnl DESC"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let tag_stats: Vec<TagStat> = stmt
            .query_map(bound, |row| {
                Ok(TagStat {
                    group_id: row.get(0)?,
                    tag: row.get(1)?,
                    total: row.get(2)?,
                    wins: row.get(3)?,
                    avg_pnl: row.get(4)?,
                    total_pnl: row.get(5)?,
                    win_rate: row.get(6)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let sql = format!(
            "SELECT CAST(SUBSTR(t.entry_time, 1, 2) AS INTEGER) AS hour,
                    COUNT(*) AS total,
                    ROUND(AVG(t.pnl), 2) AS avg_pnl,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) AS wins
             FROM trades t
             JOIN trading_days d ON d.id = t.day_id
             {filter_where}
             GROUP BY hour ORDER BY hour"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let time_stats: Vec<TimeStat> = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                Ok(TimeStat {
                    hour: row.get(0)?,
                    total: row.get(1)?,
                    avg_pnl: row.get(2)?,
                    wins: row.get(3)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let sql = format!(
            "SELECT d.date,
                    COUNT(t.id) AS trades,
                    ROUND(SUM(t.pnl), 2) AS pnl,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) AS wins
             FROM trading_days d
             JOIN trades t ON t.day_id = d.id
             {filter_where}
             GROUP BY d.id ORDER BY d.date"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let daily: Vec<DailyStat> = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                Ok(DailyStat {
                    date: row.get(0)?,
                    trades: row.get(1)?,
                    pnl: row.get(2)?,
                    wins: row.get(3)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let sql = format!(
            "SELECT COUNT(*) as total_trades,
                    ROUND(SUM(t.pnl), 2) as total_pnl,
                    ROUND(AVG(t.pnl), 2) as avg_pnl,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) as wins,
                    ROUND(MAX(t.pnl), 2) as best_trade,
                    ROUND(MIN(t.pnl), 2) as worst_trade
             FROM trades t
             JOIN trading_days d ON d.id = t.day_id
             {filter_where}"
        );
        let overall = conn
            .query_row(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref())),
                |row| {
                    Ok(OverallStats {
                        total_trades: row.get(0)?,
                        total_pnl: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                        avg_pnl: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        wins: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                        best_trade: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                        worst_trade: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    })
                },
            )
            .map_err(query_err)?;

        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let sql = format!(
            "SELECT CAST(STRFTIME('%w', d.date) AS INTEGER) AS dow,
                    COUNT(t.id)  AS total,
                    ROUND(SUM(t.pnl),  2) AS total_pnl,
                    ROUND(AVG(t.pnl),  2) AS avg_pnl,
                    SUM(CASE WHEN t.pnl > 0 THEN 1 ELSE 0 END) AS wins
             FROM trades t
             JOIN trading_days d ON d.id = t.day_id
             {filter_where}
             GROUP BY dow ORDER BY dow"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let dow_stats: Vec<DowStat> = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                Ok(DowStat {
                    dow: row.get(0)?,
                    total: row.get(1)?,
                    total_pnl: row.get(2)?,
                    avg_pnl: row.get(3)?,
                    wins: row.get(4)?,
                })
            })
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        // W/L runs need the full trade sequence ordered by date and entry time
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        bind(&mut values);
        let sql = format!(
            "SELECT t.pnl
             FROM trades t
             JOIN trading_days d ON d.id = t.day_id
             {filter_where}
             ORDER BY d.date, t.entry_time"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let pnls: Vec<f64> = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
                row.get(0)
            })
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        Ok(Analytics {
            tag_stats,
            time_stats,
            daily,
            overall,
            dow_stats,
            streaks: compute_streaks(&pnls),
        })
    }

    // ── Backup / restore ────────────────────────────────────────────────

    fn dump_sql(&self) -> Result<String, JournalError> {
        let conn = self.conn()?;
        let mut out = format!(
            "-- tradejournal export\n-- Generated: {}\n\n",
            chrono::Local::now().to_rfc3339()
        );

        let mut stmt = conn
            .prepare(
                "SELECT name, sql FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY rowid",
            )
            .map_err(query_err)?;
        let tables: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);

        for (name, create) in &tables {
            out.push_str(create);
            out.push_str(";\n");

            let mut stmt = conn
                .prepare(&format!("SELECT * FROM \"{name}\""))
                .map_err(query_err)?;
            let col_count = stmt.column_count();
            let mut rows = stmt.query([]).map_err(query_err)?;
            while let Some(row) = rows.next().map_err(query_err)? {
                let mut literals = Vec::with_capacity(col_count);
                for i in 0..col_count {
                    literals.push(sql_literal(row.get_ref(i).map_err(query_err)?));
                }
                out.push_str(&format!(
                    "INSERT INTO \"{name}\" VALUES ({});\n",
                    literals.join(", ")
                ));
            }
            out.push('\n');
        }

        let mut stmt = conn
            .prepare(
                "SELECT sql FROM sqlite_master
                 WHERE type = 'index' AND sql IS NOT NULL
                 ORDER BY name",
            )
            .map_err(query_err)?;
        let indexes: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_err)?
            .collect::<Result<_, _>>()
            .map_err(query_err)?;
        drop(stmt);
        for create in indexes {
            out.push_str(&create);
            out.push_str(";\n");
        }

        Ok(out)
    }

    fn restore_sql(&self, sql: &str) -> Result<(), JournalError> {
        // Validate the dump against a scratch database before touching data.
        // Foreign keys stay off here, as on the real restore path below.
        let scratch = rusqlite::Connection::open_in_memory().map_err(query_err)?;
        scratch
            .execute_batch("PRAGMA foreign_keys=OFF;")
            .map_err(query_err)?;
        scratch
            .execute_batch(sql)
            .map_err(|e| JournalError::Import {
                reason: format!("invalid SQL dump: {e}"),
            })?;

        let mut conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys=OFF;").map_err(query_err)?;

        let result = (|| -> Result<(), JournalError> {
            let tx = conn.transaction().map_err(query_err)?;
            let names: Vec<String> = {
                let mut stmt = tx
                    .prepare(
                        "SELECT name FROM sqlite_master
                         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                    )
                    .map_err(query_err)?;
                let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
                rows.collect::<Result<_, _>>().map_err(query_err)?
            };
            for name in names {
                tx.execute_batch(&format!("DROP TABLE IF EXISTS \"{name}\""))
                    .map_err(query_err)?;
            }
            tx.execute_batch(sql).map_err(query_err)?;
            tx.commit().map_err(query_err)
        })();

        conn.execute_batch("PRAGMA foreign_keys=ON;").map_err(query_err)?;
        result
    }
}
