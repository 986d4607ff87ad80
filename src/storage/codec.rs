//! Value encoding for the key-value store
//!
//! Frame layout:
//!
//! ```text
//! +-------+---------+-------------+-----------------+
//! | "F3"  | version | len (u32 LE)| payload (JSON)  |
//! +-------+---------+-------------+-----------------+
//! ```
//!
//! The header lets format drift surface as a deserialization error instead of a
//! confusing engine or parse failure.

use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::{Error, Result};

const MAGIC: &[u8; 2] = b"F3";

/// Current frame version
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

/// Serialize a value into a framed blob
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::Serialization(format!("value too large: {} bytes", payload.len())))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(MAGIC);
    blob.push(FORMAT_VERSION);
    blob.extend_from_slice(&len.to_le_bytes());
    blob.extend_from_slice(&payload);
    Ok(blob)
}

/// Restore a value from a framed blob
pub fn decode<T: DeserializeOwned>(blob: &[u8]) -> Result<T> {
    if blob.len() < HEADER_LEN {
        return Err(Error::Deserialization(format!("truncated header ({} bytes)", blob.len())));
    }
    let (header, payload) = blob.split_at(HEADER_LEN);

    if &header[..2] != MAGIC {
        return Err(Error::Deserialization("bad magic".to_string()));
    }
    if header[2] != FORMAT_VERSION {
        return Err(Error::Deserialization(format!("unsupported format version {}", header[2])));
    }
    let len = u32::from_le_bytes([header[3], header[4], header[5], header[6]]) as usize;
    if len != payload.len() {
        return Err(Error::Deserialization(format!(
            "length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }

    serde_json::from_slice(payload).map_err(|e| Error::Deserialization(e.to_string()))
}
