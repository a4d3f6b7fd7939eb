//! SQLite implementation of the store trait.
//!
//! This is the primary durable backend for the sync engine. It uses
//! rusqlite with bundled SQLite behind a mutex-guarded connection, and
//! runs all connection work on the blocking thread pool so executor
//! threads never stall on database I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{BatchOp, KeyValueStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. The connection is dropped on `close`,
/// after which all operations fail with [`StoreError::Closed`].
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Run an operation on the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(poisoned)?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await
        .map_err(join_failed)?
    }

    /// Like [`with_conn`](Self::with_conn) for operations that need
    /// mutable access (transactions).
    async fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(poisoned)?;
            let conn = guard.as_mut().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await
        .map_err(join_failed)?
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", e)),
    ))
}

fn join_failed(e: tokio::task::JoinError) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
        Some(format!("spawn_blocking failed: {}", e)),
    ))
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, partition: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM kv WHERE partition = ?1 AND key = ?2",
                    params![partition, key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn put(&self, partition: &str, key: &str, value: &[u8]) -> Result<()> {
        let (partition, key, value) = (partition.to_string(), key.to_string(), value.to_vec());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (partition, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value",
                params![partition, key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, partition: &str, key: &str) -> Result<()> {
        let (partition, key) = (partition.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
                params![partition, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn list(&self, partition: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let (partition, prefix) = (partition.to_string(), prefix.to_string());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM kv
                 WHERE partition = ?1 AND key >= ?2
                 ORDER BY key ASC",
            )?;

            let rows = stmt.query_map(params![partition, prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (key, value) = row?;
                // Keys are ordered, so the first non-matching key ends the
                // prefix range.
                if !key.starts_with(&prefix) {
                    break;
                }
                entries.push((key, value));
            }

            Ok(entries)
        })
        .await
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        self.with_conn_mut(move |conn| {
            let tx = conn.transaction()?;
            for op in &ops {
                match op {
                    BatchOp::Put {
                        partition,
                        key,
                        value,
                    } => {
                        tx.execute(
                            "INSERT INTO kv (partition, key, value) VALUES (?1, ?2, ?3)
                             ON CONFLICT(partition, key) DO UPDATE SET value = excluded.value",
                            params![partition, key, value],
                        )?;
                    }
                    BatchOp::Delete { partition, key } => {
                        tx.execute(
                            "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
                            params![partition, key],
                        )?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn clear_partition(&self, partition: &str) -> Result<()> {
        let partition = partition.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM kv WHERE partition = ?1", params![partition])?;
            Ok(())
        })
        .await
    }

    async fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv", [])?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(poisoned)?;
            guard.take();
            Ok(())
        })
        .await
        .map_err(join_failed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        store.put("cursors", "a", b"1").await.unwrap();
        assert_eq!(store.get("cursors", "a").await.unwrap(), Some(b"1".to_vec()));

        store.put("cursors", "a", b"2").await.unwrap();
        assert_eq!(store.get("cursors", "a").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_list_ordering() {
        let store = SqliteStore::open_memory().unwrap();
        for key in ["m3", "m1", "m2"] {
            store.put("queue", key, b"x").await.unwrap();
        }

        let keys: Vec<String> = store
            .list("queue", "")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_sqlite_prefix_list() {
        let store = SqliteStore::open_memory().unwrap();
        store.put("q", "did:x~a", b"1").await.unwrap();
        store.put("q", "did:x~b", b"2").await.unwrap();
        store.put("q", "did:y~a", b"3").await.unwrap();

        let entries = store.list("q", "did:x~").await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_batch_atomic() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .batch(vec![
                BatchOp::put("q", "a", b"1".to_vec()),
                BatchOp::delete("q", "missing"),
                BatchOp::put("q", "b", b"2".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(store.list("q", "").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_close() {
        let store = SqliteStore::open_memory().unwrap();
        store.put("q", "a", b"1").await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(
            store.get("q", "a").await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sqlite_usable_from_concurrent_tasks() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .put("q", &format!("k{i}"), &[i as u8])
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.list("q", "").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_sqlite_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("cursors", "a", b"1").await.unwrap();
            store.close().await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("cursors", "a").await.unwrap(), Some(b"1".to_vec()));
    }
}
