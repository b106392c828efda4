// src/project/mod.rs

//! Projects: named source trees that tasks run against.

pub mod catalog;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ProjectFormat, ProjectStorage};

pub use catalog::ProjectCatalog;

pub type ProjectId = String;

/// A named source tree, its location and how it is packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub format: ProjectFormat,
    pub name: String,
    /// Location of the source; for `local` storage a filesystem path.
    pub reference: PathBuf,
    pub storage: ProjectStorage,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        reference: impl Into<PathBuf>,
        format: ProjectFormat,
        storage: ProjectStorage,
    ) -> Self {
        Self {
            format,
            name: name.into(),
            reference: reference.into(),
            storage,
        }
    }

    pub fn local_plain(name: impl Into<String>, reference: impl Into<PathBuf>) -> Self {
        Self::new(name, reference, ProjectFormat::Plain, ProjectStorage::Local)
    }

    pub fn local_targz(name: impl Into<String>, reference: impl Into<PathBuf>) -> Self {
        Self::new(name, reference, ProjectFormat::Targz, ProjectStorage::Local)
    }
}
