// src/store/record.rs

//! On-disk envelope for persisted entities.
//!
//! File format (one JSON object per file):
//!
//! ```json
//! {
//!   "hash": "<hex sha-256 of data>",
//!   "created_at": "2024-01-01T00:00:00Z",
//!   "updated_at": "2024-01-01T00:00:00Z",
//!   "data": { ...entity... }
//! }
//! ```
//!
//! `hash` covers the compact form of `data`: the same tokens with all
//! whitespace outside strings removed. Files written by this crate already
//! hold compact data; indented data written elsewhere still verifies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`.
pub fn compute_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strip insignificant whitespace from well-formed JSON text, keeping key
/// order and string contents untouched.
pub fn compact_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if !matches!(c, ' ' | '\t' | '\n' | '\r') {
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: Box<RawValue>,
}

impl Record {
    /// Wrap already-serialised entity JSON, hashing it.
    pub fn new(data: Box<RawValue>, created_at: DateTime<Utc>) -> Self {
        Self {
            hash: compute_hash(compact_json(data.get()).as_bytes()),
            created_at,
            updated_at: Utc::now(),
            data,
        }
    }

    /// Hash recomputed from the embedded data.
    pub fn computed_hash(&self) -> String {
        compute_hash(compact_json(self.data.get()).as_bytes())
    }

    pub fn is_intact(&self) -> bool {
        self.computed_hash() == self.hash
    }
}
