//! SQLite access: connection wrapper, schema and the entity stores.

mod schema;
pub mod cache;
pub mod events;
pub mod photos;
pub mod rolls;
pub(crate) mod rows;
pub mod tags;

use std::cell::Cell;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Params, Row, Statement, Transaction};
use tracing::{debug, info};

pub use schema::{MIGRATIONS, SCHEMA};
pub use cache::PhotoCache;
pub use events::{PhotoStoreObserver, StoreEvent};
pub use photos::PhotoStore;
pub use rolls::{Roll, RollStore};
pub use tags::TagStore;

/// Counters of statements sent to SQLite since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Prepared read queries.
    pub queries: u64,
    /// Executed write or DDL statements.
    pub statements: u64,
}

pub struct Database {
    conn: Connection,
    stats: Cell<QueryStats>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        info!(path = %path.display(), "opened database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            stats: Cell::new(QueryStats::default()),
        }
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations();
        Ok(())
    }

    fn run_migrations(&self) {
        for migration in MIGRATIONS {
            if let Err(e) = self.conn.execute(migration, []) {
                debug!(migration, error = %e, "migration skipped");
            }
        }
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.bump(|s| s.statements += 1);
        self.conn
            .execute(sql, params)
            .with_context(|| format!("executing {}", sql))
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.bump(|s| s.statements += 1);
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Prepare a read query.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        self.bump(|s| s.queries += 1);
        self.conn
            .prepare(sql)
            .with_context(|| format!("preparing {}", sql))
    }

    /// Single-row read. No row is `Ok(None)`.
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.bump(|s| s.queries += 1);
        match self.conn.query_row(sql, params, f) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("querying {}", sql)),
        }
    }

    /// Begin a transaction. Fails when one is already open on this
    /// connection.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    pub fn meta(&self, name: &str) -> Result<Option<String>> {
        let data = self.query_row("SELECT data FROM meta WHERE name = ?", [name], |row| {
            row.get::<_, Option<String>>(0)
        })?;
        Ok(data.flatten())
    }

    pub fn set_meta(&self, name: &str, data: &str) -> Result<()> {
        self.execute(
            "INSERT INTO meta (name, data) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data",
            [name, data],
        )?;
        Ok(())
    }

    pub fn delete_meta(&self, name: &str) -> Result<()> {
        self.execute("DELETE FROM meta WHERE name = ?", [name])?;
        Ok(())
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub fn stats(&self) -> QueryStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(QueryStats::default());
    }

    fn bump(&self, f: impl FnOnce(&mut QueryStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

/// `?, ?, ?` for an IN list of `n` values.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
