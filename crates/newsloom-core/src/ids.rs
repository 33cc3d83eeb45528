//! UUID v7 utilities for time-ordered identifiers.
//!
//! All newsloom entities use UUIDv7 ids: the embedded millisecond timestamp
//! makes ids sort by creation time, which keeps index pages hot and lets
//! temporal range scans use the primary key.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Extract the embedded timestamp from a UUIDv7.
///
/// Returns `None` for non-v7 UUIDs.
pub fn extract_timestamp(id: &Uuid) -> Option<DateTime<Utc>> {
    if id.get_version_num() != 7 {
        return None;
    }
    let bytes = id.as_bytes();
    let millis = ((bytes[0] as u64) << 40)
        | ((bytes[1] as u64) << 32)
        | ((bytes[2] as u64) << 24)
        | ((bytes[3] as u64) << 16)
        | ((bytes[4] as u64) << 8)
        | (bytes[5] as u64);
    Utc.timestamp_millis_opt(millis as i64).single()
}
