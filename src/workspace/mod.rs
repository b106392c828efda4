// src/workspace/mod.rs

//! Per-task working directories.
//!
//! A [`WorkspaceBuilder`] is created once and holds everything shared between
//! tasks (filesystem, adapter registries, project catalog, root directory).
//! For each task, `builder.with_task(task).build()` yields a [`Workspace`]
//! that owns `<root>/<project_id>/<task_id>` between
//! [`prepare`](Workspace::prepare) and [`cleanup`](Workspace::cleanup).
//!
//! - [`fetch`] copies project sources into the working directory.
//! - [`unpack`] turns fetched sources into a usable tree.
//! - [`registry`] is the string-keyed lookup both are selected through.

pub mod fetch;
pub mod registry;
pub mod unpack;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{PlaybookdError, Result, Stage};
use crate::fs::FileSystem;
use crate::project::ProjectCatalog;
use crate::task::Task;

pub use fetch::{FetcherRegistry, LocalFetcher, SourceFetcher};
pub use registry::Registry;
pub use unpack::{PlainUnpacker, SourceUnpacker, TarGzUnpacker, UnpackerRegistry};

/// Directory under the system temp dir used when no root is configured.
pub const DEFAULT_ROOT_DIR: &str = "playbookd";

/// Dependencies shared by every workspace.
#[derive(Debug, Clone)]
struct Shared {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    fetchers: Option<Arc<FetcherRegistry>>,
    unpackers: Option<Arc<UnpackerRegistry>>,
    catalog: Option<Arc<ProjectCatalog>>,
}

/// Long-lived factory for [`Workspace`]s.
#[derive(Debug, Clone)]
pub struct WorkspaceBuilder {
    shared: Shared,
}

impl WorkspaceBuilder {
    /// Builder rooted at `<temp dir>/playbookd`, with no adapters or catalog.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let root = fs.temp_dir().join(DEFAULT_ROOT_DIR);
        Self {
            shared: Shared {
                fs,
                root,
                fetchers: None,
                unpackers: None,
                catalog: None,
            },
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.shared.root = root.into();
        self
    }

    pub fn with_fetchers(mut self, fetchers: Arc<FetcherRegistry>) -> Self {
        self.shared.fetchers = Some(fetchers);
        self
    }

    pub fn with_unpackers(mut self, unpackers: Arc<UnpackerRegistry>) -> Self {
        self.shared.unpackers = Some(unpackers);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<ProjectCatalog>) -> Self {
        self.shared.catalog = Some(catalog);
        self
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Per-task configuration.
    pub fn with_task(&self, task: Arc<Task>) -> WorkspaceConfig {
        WorkspaceConfig {
            shared: self.shared.clone(),
            task,
        }
    }
}

/// A builder bound to one task.
#[derive(Debug)]
pub struct WorkspaceConfig {
    shared: Shared,
    task: Arc<Task>,
}

impl WorkspaceConfig {
    pub fn build(self) -> Workspace {
        Workspace {
            shared: self.shared,
            task: self.task,
            working_dir: None,
            prepared: false,
        }
    }
}

/// The isolated directory one task executes in.
#[derive(Debug)]
pub struct Workspace {
    shared: Shared,
    task: Arc<Task>,
    working_dir: Option<PathBuf>,
    prepared: bool,
}

impl Workspace {
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    /// Resolve the project, create the working directory, fetch and unpack
    /// the source into it.
    ///
    /// On failure after the directory was created it is left in place for
    /// inspection; [`cleanup`](Self::cleanup) still removes it.
    pub fn prepare(&mut self) -> Result<()> {
        let fetchers = self
            .shared
            .fetchers
            .clone()
            .ok_or(PlaybookdError::NotProvided("fetcher registry"))?;
        let unpackers = self
            .shared
            .unpackers
            .clone()
            .ok_or(PlaybookdError::NotProvided("unpacker registry"))?;
        let catalog = self
            .shared
            .catalog
            .clone()
            .ok_or(PlaybookdError::NotProvided("project catalog"))?;

        let project_id = self.task.project_id();
        let task_id = self.task.id();
        if project_id.is_empty() {
            return Err(PlaybookdError::NotProvided("project id"));
        }

        let project = catalog.find(project_id)?;
        if !is_single_component(project_id) || !is_single_component(task_id) {
            return Err(PlaybookdError::ConfigError(format!(
                "project '{project_id}' / task '{task_id}' cannot be used as a directory name"
            )));
        }

        let dir = self.shared.root.join(project_id).join(task_id);
        if self.shared.fs.exists(&dir) {
            return Err(PlaybookdError::AlreadyExists {
                entity: "working dir",
                id: dir.display().to_string(),
            });
        }
        self.shared
            .fs
            .create_dir_all(&dir)
            .map_err(|e| PlaybookdError::stage(Stage::CreateWorkingDir, project_id, task_id, e))?;
        self.working_dir = Some(dir.clone());
        debug!(task = task_id, project = project_id, dir = ?dir, "working dir created");

        let fetcher = fetchers.get(project.storage.as_str())?;
        let unpacker = unpackers.get(project.format.as_str())?;

        fetcher
            .fetch(&project, &dir)
            .map_err(|e| PlaybookdError::stage(Stage::Fetch, project_id, task_id, e))?;
        unpacker
            .unpack(&project, &dir)
            .map_err(|e| PlaybookdError::stage(Stage::Unpack, project_id, task_id, e))?;

        self.prepared = true;
        info!(
            task = task_id,
            project = project_id,
            format = %project.format,
            storage = %project.storage,
            dir = ?dir,
            "workspace prepared"
        );
        Ok(())
    }

    /// Whether `prepare` got as far as creating the working directory.
    pub fn is_created(&self) -> bool {
        self.working_dir.is_some()
    }

    /// The populated working directory; only after a successful `prepare`.
    pub fn working_dir(&self) -> Result<&Path> {
        match (&self.working_dir, self.prepared) {
            (Some(dir), true) => Ok(dir.as_path()),
            _ => Err(PlaybookdError::WorkspaceNotPrepared(self.task.id().to_string())),
        }
    }

    /// Recursively remove the working directory.
    pub fn cleanup(&mut self) -> Result<()> {
        let dir = self
            .working_dir
            .as_deref()
            .ok_or_else(|| PlaybookdError::WorkspaceNotPrepared(self.task.id().to_string()))?;

        self.shared.fs.remove_dir_all(dir).map_err(|e| {
            PlaybookdError::stage(Stage::Cleanup, self.task.project_id(), self.task.id(), e)
        })?;
        debug!(task = %self.task.id(), dir = ?dir, "working dir removed");

        self.working_dir = None;
        self.prepared = false;
        Ok(())
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
