//! Storage Layer - SQLite-backed data files
//!
//! - [`SqliteFile`]: a data file that is an SQLite database, generic over its
//!   [`SqliteSchema`] hooks
//! - [`Keystore`]: key-value dictionary over the table `data(key, value)`
//! - [`codec`]: framing of stored values

pub mod codec;
pub mod keystore;
pub mod schema;
pub mod sqlite;

pub use keystore::{Keystore, KeystoreSchema};
pub use sqlite::{ColumnInfo, NoSchema, SqliteFile, SqliteSchema};
