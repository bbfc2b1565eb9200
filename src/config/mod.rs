//! Persistent preferences backed by SQLite.
//!
//! Values stored here are defaults for the next session; command-line flags
//! always win over them.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const MODEL: &str = "model";
pub const ROUTER: &str = "router";
pub const SEARCH_RESULTS: &str = "search_results";

/// Keys `/set` accepts.
pub const KEYS: &[&str] = &[MODEL, ROUTER, SEARCH_RESULTS];

/// Reject values the CLI would not accept for the same setting.
pub fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        MODEL if value.trim().is_empty() => bail!("model must not be empty"),
        MODEL => Ok(()),
        ROUTER => match value {
            "llm" | "keyword" => Ok(()),
            other => bail!("router must be llm or keyword, got {other}"),
        },
        SEARCH_RESULTS => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(()),
            _ => bail!("search_results must be a positive number, got {value}"),
        },
        other => bail!("unknown setting: {other} (known: {})", KEYS.join(", ")),
    }
}

/// Persistent key-value configuration store.
pub struct Config {
    conn: Mutex<Connection>,
}

impl Config {
    /// Open or create the config table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open config database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create config table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a config value by key.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Get and parse a value. A stored value that does not parse is
    /// reported as an error, not ignored.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("stored value for {key} is invalid: {raw}")),
            None => Ok(None),
        }
    }

    /// Set a config value (upsert).
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    /// Remove a config key.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    /// All stored pairs, sorted by key.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read config entries")
    }
}
