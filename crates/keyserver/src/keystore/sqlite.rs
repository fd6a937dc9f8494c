//! [`SqliteKeyStore`]: durable key store over a single SQLite connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use common::SymmetricKey;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{KeyRecord, KeyStore, KeyStoreError};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS user_keys (
        principal TEXT PRIMARY KEY,
        symm_key BLOB NOT NULL,
        issued_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS key_issuance_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        principal TEXT NOT NULL,
        issued_at TEXT NOT NULL
    );
";

const UPSERT: &str = "
    INSERT INTO user_keys (principal, symm_key, issued_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(principal) DO UPDATE SET
        symm_key = excluded.symm_key,
        issued_at = excluded.issued_at
";

const LOOKUP: &str = "SELECT symm_key, issued_at FROM user_keys WHERE principal = ?1";

const AUDIT: &str = "INSERT INTO key_issuance_log (principal, issued_at) VALUES (?1, ?2)";

/// How long a writer waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`KeyStore`].
///
/// The connection sits behind a [`Mutex`]; each operation holds the guard for
/// its whole duration and releases it on every exit path.
pub struct SqliteKeyStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, KeyStoreError> {
        let conn = Connection::open(path).map_err(|e| {
            KeyStoreError::Unavailable(format!("failed to open {}: {e}", path.display()))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, KeyStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| KeyStoreError::Unavailable(format!("failed to open in-memory db: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, KeyStoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, KeyStoreError> {
        self.conn
            .lock()
            .map_err(|_| KeyStoreError::Unavailable("connection lock poisoned".into()))
    }

    /// Number of rows in the issuance audit log for `principal`.
    #[cfg(test)]
    pub(crate) fn issuance_count(&self, principal: &str) -> Result<usize, KeyStoreError> {
        let conn = self.connection()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM key_issuance_log WHERE principal = ?1",
            params![principal],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

impl KeyStore for SqliteKeyStore {
    fn upsert(
        &self,
        principal: &str,
        key: &SymmetricKey,
        issued_at: DateTime<Utc>,
    ) -> Result<(), KeyStoreError> {
        let ts = issued_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut conn = self.connection()?;

        let tx = conn.transaction()?;
        tx.execute(UPSERT, params![principal, key.as_bytes(), ts])?;
        tx.commit()?;

        // Audit trail is best effort: the key is already committed.
        if let Err(e) = conn.execute(AUDIT, params![principal, ts]) {
            warn!(principal, error = %e, "failed to append key issuance audit entry");
        }
        debug!(principal, "key record upserted");
        Ok(())
    }

    fn lookup(&self, principal: &str) -> Result<Option<KeyRecord>, KeyStoreError> {
        let conn = self.connection()?;
        let row = conn
            .query_row(LOOKUP, params![principal], |row| {
                Ok((Zeroizing::new(row.get::<_, Vec<u8>>(0)?), row.get::<_, String>(1)?))
            })
            .optional()?;

        let Some((raw_key, ts)) = row else {
            return Ok(None);
        };
        let corrupt = || KeyStoreError::Corrupt {
            principal: principal.to_owned(),
        };
        let key = SymmetricKey::from_slice(&raw_key).map_err(|_| corrupt())?;
        let issued_at = DateTime::parse_from_rfc3339(&ts)
            .map_err(|_| corrupt())?
            .with_timezone(&Utc);

        Ok(Some(KeyRecord {
            principal: principal.to_owned(),
            key,
            issued_at,
        }))
    }

    fn count(&self) -> Result<usize, KeyStoreError> {
        let conn = self.connection()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM user_keys", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
