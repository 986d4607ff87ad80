//! SQLite-backed data files

use std::io::Read;
use std::path::{Path, PathBuf};
use rusqlite::{Connection, OpenFlags};
use crate::datafile::{DataFile, FileState};
use crate::pathfinder::DataPathFinder;
use crate::{Error, Result};
use super::schema;

/// Hooks describing a concrete database layout.
///
/// Files are bootstrapped by [`SqliteFile::ensure_schema`], which calls
/// `create_schema` followed by `populate` on a freshly created file, both inside
/// one transaction. Hooks must not issue BEGIN/COMMIT themselves.
pub trait SqliteSchema {
    /// Identifying name of the file type
    const KIND: &'static str;

    const DEFAULT_FILENAME: Option<&'static str> = None;

    /// Issue the CREATE statements
    fn create_schema(&self, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    /// Initial contents for a database with all tables created but empty
    fn populate(&self, _conn: &Connection) -> Result<()> {
        Ok(())
    }

    /// Caption and tooltip of a column, attached to [`ColumnInfo`] rows
    fn column_docs(&self, _table: &str, _column: &str) -> Option<(&str, &str)> {
        None
    }
}

/// Plain database file with no schema of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl SqliteSchema for NoSchema {
    const KIND: &'static str = "SqliteFile";
}

/// Column metadata returned by [`SqliteFile::get_table_info`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
    pub caption: Option<String>,
    pub tooltip: Option<String>,
}

/// A data file that is an SQLite database.
///
/// The connection is opened lazily, probed for liveness before reuse, and closed
/// whenever the file moves or is deleted. Connections are opened without the
/// CREATE flag except by [`ensure_schema`](Self::ensure_schema), so a missing
/// backing file is never silently recreated empty.
#[derive(Debug)]
pub struct SqliteFile<S: SqliteSchema = NoSchema> {
    state: FileState,
    schema: S,
    conn: Option<Connection>,
}

impl<S: SqliteSchema + Default> Default for SqliteFile<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: SqliteSchema> SqliteFile<S> {
    /// Unbound file; call `load` or `save_as` to give it a filename
    pub fn new(schema: S) -> Self {
        Self {
            state: FileState::default(),
            schema,
            conn: None,
        }
    }

    /// File bound to `path`, which need not exist yet
    pub fn with_filename(schema: S, path: impl Into<PathBuf>) -> Self {
        Self {
            state: FileState::with_filename(path),
            schema,
            conn: None,
        }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    // ========== Connection Management ==========

    /// Whether the held connection answers a probe query
    pub fn connection_is_open(&self) -> bool {
        match &self.conn {
            Some(conn) => match conn.query_row(schema::PROBE, [], |row| row.get::<_, i64>(0)) {
                Ok(_) => true,
                Err(e) => {
                    tracing::trace!("Connection probe failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Return a live connection, opening one if needed.
    ///
    /// With `force_new` a fresh connection always replaces the held one.
    pub fn get_connection(&mut self, force_new: bool) -> Result<&Connection> {
        self.ensure_connection(force_new)?;
        self.conn.as_ref().ok_or(Error::NoFilename)
    }

    /// Close the held connection, if any
    pub fn close_if_open(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            tracing::debug!("Closing connection to {:?}", self.state.filename());
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    fn require_filename(&self) -> Result<PathBuf> {
        self.state.filename().map(Path::to_path_buf).ok_or(Error::NoFilename)
    }

    fn ensure_connection(&mut self, force_new: bool) -> Result<()> {
        let path = self.require_filename()?;
        if force_new || !self.connection_is_open() {
            self.conn = Some(open_connection(&path, false)?);
        }
        Ok(())
    }

    /// Move the connection out, e.g. into a worker thread
    pub(crate) fn take_connection(&mut self) -> Result<Connection> {
        self.ensure_connection(false)?;
        self.conn.take().ok_or(Error::NoFilename)
    }

    pub(crate) fn restore_connection(&mut self, conn: Connection) {
        self.conn = Some(conn);
    }

    // ========== Schema ==========

    /// Create the file and its schema if the file does not exist yet.
    ///
    /// An existing file is left alone whatever its schema.
    pub fn ensure_schema(&mut self) -> Result<()> {
        let path = self.require_filename()?;
        if path.exists() {
            return Ok(());
        }

        tracing::debug!("Creating {} schema in {}", S::KIND, path.display());
        self.close_if_open()?;
        self.conn = Some(open_connection(&path, true)?);
        if let Err(e) = self.bootstrap() {
            // A half-built file would be taken as bootstrapped next time
            tracing::debug!("Schema bootstrap failed for {}: {}", path.display(), e);
            if let Some(conn) = self.conn.take() {
                conn.execute_batch("ROLLBACK").ok();
            }
            std::fs::remove_file(&path).ok();
            return Err(e);
        }
        Ok(())
    }

    fn bootstrap(&self) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(Error::NoFilename)?;
        conn.execute_batch("BEGIN")?;
        self.schema.create_schema(conn)?;
        self.schema.populate(conn)?;
        conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Run the schema's CREATE statements
    pub fn create_schema(&mut self) -> Result<()> {
        self.ensure_connection(false)?;
        let conn = self.conn.as_ref().ok_or(Error::NoFilename)?;
        self.schema.create_schema(conn)
    }

    /// Run the schema's initial INSERT statements
    pub fn populate(&mut self) -> Result<()> {
        self.ensure_connection(false)?;
        let conn = self.conn.as_ref().ok_or(Error::NoFilename)?;
        self.schema.populate(conn)
    }

    // ========== Introspection ==========

    /// Names of the user tables
    pub fn get_table_names(&mut self) -> Result<Vec<String>> {
        table_names(self.get_connection(false)?)
    }

    /// Column metadata of `table`; fails with [`Error::TableNotFound`] if it has no columns
    pub fn get_table_info(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.ensure_connection(false)?;
        let conn = self.conn.as_ref().ok_or(Error::NoFilename)?;

        let mut stmt = conn.prepare(schema::SELECT_TABLE_INFO)?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? > 0,
                    caption: None,
                    tooltip: None,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        Ok(columns
            .into_iter()
            .map(|mut column| {
                if let Some((caption, tooltip)) = self.schema.column_docs(table, &column.name) {
                    column.caption = Some(caption.to_string());
                    column.tooltip = Some(tooltip.to_string());
                }
                column
            })
            .collect())
    }

    pub fn get_column_names(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self.get_table_info(table)?.into_iter().map(|c| c.name).collect())
    }

    // ========== Transactions & Lifecycle ==========

    /// Flush pending writes on the current connection
    pub fn commit(&mut self) -> Result<()> {
        commit_connection(self.get_connection(false)?)?;
        Ok(())
    }

    /// Close the connection and remove the backing file.
    ///
    /// The filename is kept; the next connection attempt fails until
    /// [`ensure_schema`](Self::ensure_schema) recreates the file.
    pub fn delete(&mut self) -> Result<()> {
        let path = self.require_filename()?;
        self.close_if_open()?;
        std::fs::remove_file(&path)?;
        tracing::debug!("Deleted {}", path.display());
        Ok(())
    }
}

impl<S: SqliteSchema> DataFile for SqliteFile<S> {
    const KIND: &'static str = S::KIND;
    const DEFAULT_FILENAME: Option<&'static str> = S::DEFAULT_FILENAME;

    fn state(&self) -> &FileState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FileState {
        &mut self.state
    }

    /// Every SQLite database starts with the 16-byte header string
    fn test_magic(&self, path: &Path) -> Result<()> {
        let mut header = [0u8; 16];
        match std::fs::File::open(path)?.read_exact(&mut header) {
            Ok(()) if &header == SQLITE_HEADER => Ok(()),
            Ok(()) => Err(Error::FormatMismatch { path: path.to_path_buf(), kind: S::KIND }),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::FormatMismatch { path: path.to_path_buf(), kind: S::KIND })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loading is opening a connection and checking it reads as a database
    fn do_load(&mut self, path: &Path) -> Result<()> {
        let conn = open_connection(path, false)?;
        table_names(&conn)?;
        self.close_if_open()?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Copy the database file and reconnect to the copy. Saving onto the current
    /// filename does nothing.
    fn do_save_as(&mut self, path: &Path) -> Result<()> {
        let current = self
            .state
            .filename()
            .map(Path::to_path_buf)
            .ok_or(Error::MissingPath { kind: S::KIND })?;
        if same_file(&current, path) {
            return Ok(());
        }

        self.close_if_open()?;
        std::fs::copy(&current, path)?;
        tracing::debug!("Copied {} to {}", current.display(), path.display());
        self.conn = Some(open_connection(path, false)?);
        Ok(())
    }

    /// Load the bundled default and continue on a fresh local copy of it, so the
    /// bundled database is never written to
    fn init_default(&mut self, finder: &DataPathFinder) -> Result<()> {
        let name = S::DEFAULT_FILENAME.ok_or(Error::NoDefault { kind: S::KIND })?;
        let fullpath = finder.default_data_path(&[name])?;
        self.load(Some(&fullpath))?;

        let name = Path::new(name);
        let stem = name.file_stem().and_then(|s| s.to_str()).unwrap_or(S::KIND);
        let ext = name.extension().and_then(|s| s.to_str()).unwrap_or("");
        let local = finder.new_filename(stem, ext);
        self.save_as(Some(&local))
    }
}

const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

fn open_connection(path: &Path, create: bool) -> Result<Connection> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let conn = Connection::open_with_flags(path, flags)?;
    tracing::debug!("Opened connection to {}", path.display());
    Ok(conn)
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(schema::SELECT_TABLE_NAMES)?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Commit the open transaction, if one is open
pub(crate) fn commit_connection(conn: &Connection) -> rusqlite::Result<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
