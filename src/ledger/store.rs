use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use super::error::{LedgerError, Result};

const CREATE_HANDLE_TABLE: &str = "CREATE TABLE IF NOT EXISTS handle (
    handle text PRIMARY KEY,
    noid text,
    modify_date text
);";

const INSERT_HANDLE: &str = "INSERT INTO handle(handle, noid, modify_date) VALUES(?1, ?2, ?3)";
const UPDATE_MODIFY_DATE: &str = "UPDATE handle SET modify_date = ?1 WHERE handle = ?2";

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One row of the `handle` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandleRecord {
    pub handle: String,
    pub noid: String,
    pub modify_date: String,
}

/// SQLite-backed handle -> noid table
///
/// Every mutating call is a single autocommitted statement, so a crash
/// between handles leaves previously written rows intact.
pub struct HandleStore {
    conn: Option<Connection>,
}

impl HandleStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with an explicit busy timeout for competing writers
    pub fn open_with_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening handle store at: {}", path.display());

        let unavailable = |reason: String| LedgerError::StorageUnavailable {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| unavailable(e.to_string()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL;")
            .map_err(|e| unavailable(e.to_string()))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| unavailable(e.to_string()))?;

        Self::bootstrap(conn).map_err(|e| unavailable(e.to_string()))
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| LedgerError::StorageUnavailable {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        })?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_HANDLE_TABLE)?;
        debug!("Handle table ready");
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(LedgerError::StorageClosed)
    }

    /// Stored noid for a handle, if any
    pub fn lookup(&self, handle: &str) -> Result<Option<String>> {
        let noid = self
            .conn()?
            .query_row(
                "SELECT noid FROM handle WHERE handle = ?1",
                params![handle],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(noid.flatten())
    }

    /// Full row for a handle, if any
    pub fn get(&self, handle: &str) -> Result<Option<HandleRecord>> {
        let record = self
            .conn()?
            .query_row(
                "SELECT handle, noid, modify_date FROM handle WHERE handle = ?1",
                params![handle],
                |row| {
                    Ok(HandleRecord {
                        handle: row.get(0)?,
                        noid: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        modify_date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Record a new handle; a duplicate is a constraint violation
    pub fn insert(&self, handle: &str, noid: &str, modify_date: &str) -> Result<()> {
        match self
            .conn()?
            .execute(INSERT_HANDLE, params![handle, noid, modify_date])
        {
            Ok(_) => {
                debug!(handle, noid, "Inserted handle");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(LedgerError::ConstraintViolation(handle.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Overwrite `modify_date`; returns the number of rows touched (0 or 1)
    pub fn update_modify_date(&self, handle: &str, modify_date: &str) -> Result<usize> {
        let rows = self
            .conn()?
            .execute(UPDATE_MODIFY_DATE, params![modify_date, handle])?;
        debug!(handle, modify_date, rows, "Updated modify_date");
        Ok(rows)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM handle", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Release the connection; any later call fails with `StorageClosed`
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(LedgerError::StorageClosed)?;
        conn.close().map_err(|(_, err)| LedgerError::Sqlite(err))?;
        info!("Handle store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}
