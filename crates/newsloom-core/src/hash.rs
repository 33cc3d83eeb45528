//! Job payload content hashing.
//!
//! The payload hash is the idempotency key for the job queue: while a job
//! with a given (job_type, payload_hash) is non-terminal, no second job
//! with the same key may be created.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// Compute the content hash of a job payload.
///
/// `None` payloads hash to the digest of the empty string, so two payload-
/// less jobs of the same type still deduplicate against each other.
pub fn payload_hash(payload: Option<&JsonValue>) -> String {
    let mut hasher = Sha256::new();
    if let Some(value) = payload {
        hasher.update(canonical_json(value).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value with object keys sorted, so that payloads built
/// in different field orders hash identically.
fn canonical_json(value: &JsonValue) -> String {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        JsonValue::Array(items) => {
            let elems: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", elems.join(","))
        }
        other => other.to_string(),
    }
}
