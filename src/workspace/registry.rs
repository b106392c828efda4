// src/workspace/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{PlaybookdError, Result};

/// String-keyed table of adapters (fetchers by storage, unpackers by format).
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// `kind` names the adapter type in "not registered" errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn register(mut self, key: impl Into<String>, adapter: Arc<T>) -> Self {
        self.entries.insert(key.into(), adapter);
        self
    }

    pub fn get(&self, key: &str) -> Result<Arc<T>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| PlaybookdError::Unregistered {
                kind: self.kind,
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("keys", &self.keys())
            .finish()
    }
}
