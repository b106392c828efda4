// src/project/catalog.rs

//! In-memory project index with optional write-through persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::errors::{PlaybookdError, Result};
use crate::fs::FileSystem;
use crate::store::RecordStore;
use crate::types::ARCHIVE_SUFFIX;

use super::{Project, ProjectId};

/// Maps project ids to [`Project`]s.
///
/// All reads and writes go through one mutex. When a [`RecordStore`] is
/// attached, every mutation is persisted before the in-memory index changes,
/// so a failed write leaves the index untouched.
#[derive(Debug)]
pub struct ProjectCatalog {
    fs: Arc<dyn FileSystem>,
    root: Option<PathBuf>,
    projects: Mutex<HashMap<ProjectId, Project>>,
    store: Option<RecordStore<Project>>,
}

impl ProjectCatalog {
    /// Empty, memory-only catalog.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            root: None,
            projects: Mutex::new(HashMap::new()),
            store: None,
        }
    }

    /// Directory scanned by [`load_projects`](Self::load_projects).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Attach a record store and load every intact record from it.
    pub fn with_store(mut self, store: RecordStore<Project>) -> Result<Self> {
        let stored = store.find_all()?;
        {
            let mut projects = self.lock();
            for (id, project) in stored {
                projects.insert(id, project);
            }
            info!(count = projects.len(), base = ?store.base(), "catalog hydrated from record store");
        }
        self.store = Some(store);
        Ok(self)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ProjectId, Project>> {
        self.projects.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn find(&self, id: &str) -> Result<Project> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| PlaybookdError::ProjectNotFound(id.to_string()))
    }

    /// All projects, sorted by id.
    pub fn find_all(&self) -> Vec<(ProjectId, Project)> {
        let mut all: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Register `project` under `id` unless the id is already taken.
    pub fn safe_store(&self, id: &str, project: Project) -> Result<()> {
        let mut projects = self.lock();
        if projects.contains_key(id) {
            return Err(PlaybookdError::AlreadyExists {
                entity: "project",
                id: id.to_string(),
            });
        }
        if let Some(store) = &self.store {
            store.safe_store(id, &project)?;
        }
        debug!(project = id, "project registered");
        projects.insert(id.to_string(), project);
        Ok(())
    }

    /// Insert or replace.
    pub fn store(&self, id: &str, project: Project) -> Result<()> {
        let mut projects = self.lock();
        if let Some(store) = &self.store {
            store.write(id, &project)?;
        }
        projects.insert(id.to_string(), project);
        Ok(())
    }

    /// Replace an existing project.
    pub fn update(&self, id: &str, project: Project) -> Result<()> {
        let mut projects = self.lock();
        if !projects.contains_key(id) {
            return Err(PlaybookdError::ProjectNotFound(id.to_string()));
        }
        if let Some(store) = &self.store {
            store.write(id, &project)?;
        }
        projects.insert(id.to_string(), project);
        Ok(())
    }

    /// Remove an existing project.
    pub fn remove(&self, id: &str) -> Result<Project> {
        let mut projects = self.lock();
        if !projects.contains_key(id) {
            return Err(PlaybookdError::ProjectNotFound(id.to_string()));
        }
        if let Some(store) = &self.store {
            store.remove(id)?;
        }
        projects
            .remove(id)
            .ok_or_else(|| PlaybookdError::ProjectNotFound(id.to_string()))
    }

    /// Discover projects under the configured root.
    ///
    /// - `<name>.tar.gz` files become `targz` projects named `<name>`.
    /// - Directories become `plain` projects named after the directory.
    /// - Hidden entries and anything else are skipped.
    ///
    /// Each discovery is registered with [`safe_store`](Self::safe_store).
    /// An id that is already registered with an identical definition (e.g.
    /// hydrated from the record store) is left alone; any other collision
    /// aborts the load. Returns the number of newly registered projects.
    pub fn load_projects(&self) -> Result<usize> {
        let root = self
            .root
            .as_deref()
            .ok_or(PlaybookdError::NotProvided("projects root"))?;

        let mut entries = self.fs.read_dir(root)?;
        entries.sort();

        let mut added = 0;
        for path in entries {
            let Some(project) = self.discover(&path) else {
                debug!(path = ?path, "skipping entry in projects root");
                continue;
            };

            let id = project.name.clone();
            if let Ok(existing) = self.find(&id) {
                if existing == project {
                    debug!(project = %id, "project already registered");
                    continue;
                }
            }
            self.safe_store(&id, project)?;
            added += 1;
        }

        info!(root = ?root, added, total = self.len(), "projects loaded");
        Ok(added)
    }

    fn discover(&self, path: &Path) -> Option<Project> {
        let file_name = path.file_name()?.to_str()?;
        if file_name.starts_with('.') {
            return None;
        }

        if self.fs.is_file(path) {
            let name = file_name.strip_suffix(ARCHIVE_SUFFIX)?;
            if name.is_empty() {
                return None;
            }
            return Some(Project::local_targz(name, path));
        }

        if self.fs.is_dir(path) {
            return Some(Project::local_plain(file_name, path));
        }

        None
    }
}
