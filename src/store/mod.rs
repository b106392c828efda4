// src/store/mod.rs

//! Durable, tamper-evident persistence.
//!
//! - [`record`] defines the on-disk envelope and its SHA-256 hash.
//! - [`record_store`] maps ids to envelope files under a base directory.

pub mod record;
pub mod record_store;

pub use record::{compact_json, compute_hash, Record};
pub use record_store::{is_valid_record_id, RecordStore};
