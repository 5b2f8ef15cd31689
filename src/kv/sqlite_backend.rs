use super::schema::KV_VERSIONED_SCHEMAS;
use super::{BackendError, CausalContext, FetchResponse, KvBackend, PutOptions};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable single-node backend keeping siblings in SQLite rows.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open key-value database")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let latest = KV_VERSIONED_SCHEMAS
            .last()
            .context("No key-value schema defined")?;

        if is_new_db {
            info!("Creating new key-value database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION as i64;
            if db_version < 1 {
                anyhow::bail!(
                    "Key-value database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = KV_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version == db_version as usize)
                .with_context(|| format!("Unknown key-value database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Key-value database schema validation failed for version {}",
                    db_version
                )
            })?;

            if (db_version as usize) < latest.version {
                Self::migrate(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut current = from_version;
        for schema in KV_VERSIONED_SCHEMAS.iter().filter(|s| s.version > from_version) {
            info!(
                "Migrating key-value database from version {} to {}",
                current, schema.version
            );
            if let Some(migration) = schema.migration {
                migration(&tx)
                    .with_context(|| format!("Failed to migrate to version {}", schema.version))?;
            }
            current = schema.version;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + current),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::Execution("SQLite connection lock poisoned".to_string()))
    }

    fn allow_multi(conn: &Connection, namespace: &str) -> rusqlite::Result<bool> {
        let allow_multi: Option<i64> = conn
            .query_row(
                "SELECT allow_multi FROM bucket_properties WHERE namespace = ?1",
                params![namespace],
                |row| row.get(0),
            )
            .optional()?;
        Ok(allow_multi.unwrap_or(0) != 0)
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> BackendError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => BackendError::Timeout,
        Some(ErrorCode::OperationInterrupted) => BackendError::Interrupted,
        Some(ErrorCode::CannotOpen) => BackendError::Unavailable(err.to_string()),
        _ => BackendError::Sqlite(err),
    }
}

impl KvBackend for SqliteBackend {
    fn set_allow_multi(&self, namespace: &str, allow_multi: bool) -> Result<(), BackendError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO bucket_properties (namespace, allow_multi) VALUES (?1, ?2)
             ON CONFLICT(namespace) DO UPDATE SET allow_multi = excluded.allow_multi",
            params![namespace, allow_multi as i64],
        )
        .map_err(map_sqlite_error)?;
        Ok(())
    }

    fn get(&self, namespace: &str, key: &str) -> Result<FetchResponse, BackendError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT version, value FROM siblings
                 WHERE namespace = ?1 AND key = ?2 ORDER BY version",
            )
            .map_err(map_sqlite_error)?;
        let rows: Vec<(i64, Vec<u8>)> = stmt
            .query_map(params![namespace, key], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(map_sqlite_error)?
            .collect::<rusqlite::Result<_>>()
            .map_err(map_sqlite_error)?;

        if rows.len() > 1 && !Self::allow_multi(&conn, namespace).map_err(map_sqlite_error)? {
            return Err(BackendError::UnresolvedConflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }

        let context = CausalContext::new(rows.iter().map(|(version, _)| *version as u64));
        Ok(FetchResponse {
            values: rows.into_iter().map(|(_, value)| value).collect(),
            context,
        })
    }

    fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        options: &PutOptions,
    ) -> Result<(), BackendError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(map_sqlite_error)?;

        if Self::allow_multi(&tx, namespace).map_err(map_sqlite_error)? {
            for version in options.context.versions() {
                tx.execute(
                    "DELETE FROM siblings WHERE namespace = ?1 AND key = ?2 AND version = ?3",
                    params![namespace, key, version as i64],
                )
                .map_err(map_sqlite_error)?;
            }
        } else {
            tx.execute(
                "DELETE FROM siblings WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .map_err(map_sqlite_error)?;
        }

        tx.execute(
            "INSERT INTO siblings (namespace, key, value) VALUES (?1, ?2, ?3)",
            params![namespace, key, value],
        )
        .map_err(map_sqlite_error)?;
        let version = tx.last_insert_rowid();
        tx.commit().map_err(map_sqlite_error)?;

        debug!("Stored {}/{} version {}", namespace, key, version);
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<(), BackendError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM siblings WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )
        .map_err(map_sqlite_error)?;
        Ok(())
    }

    fn ping(&self) -> Result<(), BackendError> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(map_sqlite_error)?;
        Ok(())
    }
}
