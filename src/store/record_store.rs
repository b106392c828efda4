// src/store/record_store.rs

//! Hash-verified key/value persistence, one file per record.

use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{PlaybookdError, Result};
use crate::fs::{is_not_found, FileSystem};

use super::record::Record;

/// Valid record ids double as file names, so they may not contain path
/// separators or start with a dot.
static RECORD_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("record id pattern is valid")
});

const TEMP_PREFIX: &str = ".tmp-";

pub fn is_valid_record_id(id: &str) -> bool {
    RECORD_ID.is_match(id)
}

/// Persists entities of type `T` under `<base>/<id>`.
pub struct RecordStore<T> {
    fs: Arc<dyn FileSystem>,
    base: PathBuf,
    _entity: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a store rooted at `base`, creating the directory if needed.
    pub fn open(fs: Arc<dyn FileSystem>, base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs.create_dir_all(&base)?;
        debug!(base = ?base, "record store opened");
        Ok(Self {
            fs,
            base,
            _entity: PhantomData,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_record_id(id) {
            return Err(PlaybookdError::InvalidRecordId(id.to_string()));
        }
        Ok(self.base.join(id))
    }

    /// Load and verify the envelope for `id`.
    ///
    /// Absence is `RecordNotFound`; a hash mismatch is `RecordCorrupted`.
    pub fn read_record(&self, id: &str) -> Result<Record> {
        let path = self.path_for(id)?;
        let bytes = self.fs.read(&path).map_err(|err| {
            if is_not_found(&err) {
                PlaybookdError::RecordNotFound(id.to_string())
            } else {
                PlaybookdError::Other(err)
            }
        })?;

        let record: Record = serde_json::from_slice(&bytes)?;
        let computed = record.computed_hash();
        if computed != record.hash {
            return Err(PlaybookdError::RecordCorrupted {
                id: id.to_string(),
                stored: record.hash,
                computed,
            });
        }
        Ok(record)
    }

    pub fn read(&self, id: &str) -> Result<T> {
        let record = self.read_record(id)?;
        Ok(serde_json::from_str(record.data.get())?)
    }

    /// Write (or replace) the record for `id`.
    ///
    /// The creation time of an existing, intact record is kept. The file is
    /// written next to its destination and renamed into place.
    pub fn write(&self, id: &str, entity: &T) -> Result<()> {
        let path = self.path_for(id)?;
        let data = RawValue::from_string(serde_json::to_string(entity)?)?;

        let created_at = match self.read_record(id) {
            Ok(existing) => existing.created_at,
            Err(_) => Utc::now(),
        };
        let record = Record::new(data, created_at);
        let body = serde_json::to_vec_pretty(&record)?;

        let tmp = self
            .base
            .join(format!("{TEMP_PREFIX}{}", Uuid::new_v4().simple()));
        self.fs.write(&tmp, &body)?;
        if let Err(err) = self.fs.rename(&tmp, &path) {
            let _ = self.fs.remove_file(&tmp);
            return Err(err.into());
        }

        debug!(id, hash = %record.hash, "record written");
        Ok(())
    }

    /// Write only if no record exists under `id`.
    pub fn safe_store(&self, id: &str, entity: &T) -> Result<()> {
        match self.read_record(id) {
            Ok(_) | Err(PlaybookdError::RecordCorrupted { .. }) => {
                Err(PlaybookdError::AlreadyExists {
                    entity: "record",
                    id: id.to_string(),
                })
            }
            Err(PlaybookdError::RecordNotFound(_)) => self.write(id, entity),
            Err(err) => Err(err),
        }
    }

    /// Delete the record for `id`. Removing a missing record is not an error.
    pub fn remove(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        match self.fs.remove_file(&path) {
            Ok(()) => {
                debug!(id, "record removed");
                Ok(())
            }
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Every readable record, keyed by id and sorted by id.
    ///
    /// Entries that cannot be read, fail verification or do not deserialize
    /// are logged and skipped.
    pub fn find_all(&self) -> Result<Vec<(String, T)>> {
        let mut entities = Vec::new();
        for path in self.fs.read_dir(&self.base)? {
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = ?path, "skipping record with non UTF-8 name");
                continue;
            };
            if !is_valid_record_id(id) || self.fs.is_dir(&path) {
                continue;
            }
            match self.read(id) {
                Ok(entity) => entities.push((id.to_string(), entity)),
                Err(err) => warn!(id, error = %err, "skipping unreadable record"),
            }
        }
        entities.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entities)
    }
}
