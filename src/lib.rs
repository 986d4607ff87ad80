//! # f312 - Typed data files
//!
//! Represents on-disk files as typed in-memory objects behind one load/save contract.
//!
//! f312 provides:
//! - The [`DataFile`] trait: load-once lifecycle, magic check hook, save-as
//! - [`SqliteFile`]: a data file backed by an embedded SQLite database with a lazily
//!   opened, liveness-probed connection
//! - [`Keystore`]: a persistent key-value dictionary over a single `data` table
//! - [`ConfigFile`]: a typed configuration file with a magic header and TOML body
//! - [`DataPathFinder`]: resolution of bundled default data files

use std::path::PathBuf;

pub mod config;
pub mod configfile;
pub mod datafile;
pub mod pathfinder;
pub mod storage;

// Re-exports for convenient access
pub use config::F312Config;
pub use configfile::{ConfigFile, ConfigSchema};
pub use datafile::{DataFile, FileState};
pub use pathfinder::DataPathFinder;
pub use storage::{ColumnInfo, Keystore, NoSchema, SqliteFile, SqliteSchema};

/// Result type alias for f312 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for f312 operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind}: no path given and no filename or default filename to fall back to")]
    MissingPath { kind: &'static str },

    #[error("Empty file: '{}'", .0.display())]
    EmptyFile(PathBuf),

    #[error("File can be loaded only once (already loaded from '{}')", .0.display())]
    AlreadyLoaded(PathBuf),

    #[error("File '{}' does not appear to be a '{kind}'", path.display())]
    FormatMismatch { path: PathBuf, kind: &'static str },

    #[error("{kind} has no default filename")]
    NoDefault { kind: &'static str },

    #[error("'filename' is not set")]
    NoFilename,

    #[error("Cannot get info for table '{0}'")]
    TableNotFound(String),

    #[error("Key not found: '{0}'")]
    KeyNotFound(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Path not found: '{}'", .0.display())]
    PathNotFound(PathBuf),

    #[error("Storage engine error: {0}")]
    StorageEngine(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}
