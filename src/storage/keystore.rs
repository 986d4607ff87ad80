//! Persistent key-value dictionary over an SQLite file

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::datafile::{DataFile, FileState};
use crate::pathfinder::DataPathFinder;
use crate::{Error, Result};
use super::codec;
use super::schema;
use super::sqlite::{SqliteFile, SqliteSchema, commit_connection};

/// Layout of a key-value file: one `data(key, value)` table indexed on `key`
#[derive(Debug, Clone, Copy, Default)]
pub struct KeystoreSchema;

impl SqliteSchema for KeystoreSchema {
    const KIND: &'static str = "Keystore";

    fn create_schema(&self, conn: &Connection) -> Result<()> {
        for stmt in schema::keystore_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }
}

/// Key-value store backed by an SQLite file.
///
/// Values are any serde type, stored as opaque framed blobs (see
/// [`codec`](super::codec)). With auto-commit on (the default) every `set`
/// is committed immediately; otherwise writes accumulate in a transaction until
/// [`commit`](SqliteFile::commit) or [`commit_async`](Self::commit_async).
///
/// Derefs to the underlying [`SqliteFile`] for connection management and
/// introspection.
#[derive(Debug)]
pub struct Keystore {
    db: SqliteFile<KeystoreSchema>,
    auto_commit: bool,
}

impl Default for Keystore {
    fn default() -> Self {
        Self::new()
    }
}

impl Keystore {
    /// Unbound store; give it a file with `load`
    pub fn new() -> Self {
        Self {
            db: SqliteFile::new(KeystoreSchema),
            auto_commit: true,
        }
    }

    /// Open the store at `path`, creating the file and schema if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with(path, true)
    }

    pub fn open_with(path: impl Into<PathBuf>, auto_commit: bool) -> Result<Self> {
        let mut db = SqliteFile::with_filename(KeystoreSchema, path);
        db.ensure_schema()?;
        Ok(Self { db, auto_commit })
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    /// Value stored under `key`, or `None` if absent
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let stored: Option<Value> = self
            .db
            .get_connection(false)?
            .query_row("SELECT value FROM data WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        match stored {
            None => Ok(None),
            Some(Value::Blob(blob)) => codec::decode(&blob).map(Some),
            Some(other) => Err(Error::Deserialization(format!(
                "value for '{}' is {}, not a blob",
                key,
                other.data_type()
            ))),
        }
    }

    /// Value stored under `key`, or `default` if absent
    pub fn get_or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Value stored under `key`; fails with [`Error::KeyNotFound`] if absent
    pub fn require<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        self.get(key)?.ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Store `value` under `key`, overwriting any previous value. Returns `value`.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<T> {
        let blob = codec::encode(&value)?;
        let conn = self.db.get_connection(false)?;
        if !self.auto_commit && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        conn.execute(
            r#"
            INSERT INTO data (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, blob],
        )?;
        if self.auto_commit {
            self.db.commit()?;
        }
        Ok(value)
    }

    pub fn contains(&mut self, key: &str) -> Result<bool> {
        let found = self
            .db
            .get_connection(false)?
            .query_row("SELECT 1 FROM data WHERE key = ?1", [key], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Remove `key`; returns whether it was present
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let conn = self.db.get_connection(false)?;
        if !self.auto_commit && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        let removed = conn.execute("DELETE FROM data WHERE key = ?1", [key])?;
        if self.auto_commit {
            self.db.commit()?;
        }
        Ok(removed > 0)
    }

    /// All keys in ascending order
    pub fn keys(&mut self) -> Result<Vec<String>> {
        let conn = self.db.get_connection(false)?;
        let mut stmt = conn.prepare("SELECT key FROM data ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    pub fn len(&mut self) -> Result<usize> {
        let count: i64 = self
            .db
            .get_connection(false)?
            .query_row("SELECT COUNT(*) FROM data", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Commit on a blocking worker thread without blocking the calling task.
    ///
    /// The connection moves to the worker and back; `&mut self` keeps every other
    /// operation off it meanwhile. If this future is dropped mid-flight the
    /// connection is lost and the next access opens a new one.
    pub async fn commit_async(&mut self) -> Result<()> {
        let conn = self.db.take_connection()?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = commit_connection(&conn);
            (conn, result)
        })
        .await?;
        self.db.restore_connection(conn);
        Ok(result?)
    }
}

impl Deref for Keystore {
    type Target = SqliteFile<KeystoreSchema>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl DerefMut for Keystore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.db
    }
}

impl DataFile for Keystore {
    const KIND: &'static str = KeystoreSchema::KIND;

    fn state(&self) -> &FileState {
        self.db.state()
    }

    fn state_mut(&mut self) -> &mut FileState {
        self.db.state_mut()
    }

    fn test_magic(&self, path: &Path) -> Result<()> {
        self.db.test_magic(path)
    }

    fn do_load(&mut self, path: &Path) -> Result<()> {
        self.db.do_load(path)
    }

    fn do_save_as(&mut self, path: &Path) -> Result<()> {
        self.db.do_save_as(path)
    }

    fn init_default(&mut self, finder: &DataPathFinder) -> Result<()> {
        self.db.init_default(finder)
    }
}
