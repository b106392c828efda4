#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use playbookd::config::{ConfigFile, RawConfigFile};
use playbookd::fs::mock::MockFileSystem;
use playbookd::fs::FileSystem;
use playbookd::project::{Project, ProjectCatalog};
use playbookd::task::{PlaybookParameters, Task, TaskParameters, ANSIBLE_PLAYBOOK};
use playbookd::workspace::{FetcherRegistry, UnpackerRegistry, WorkspaceBuilder};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.dispatcher.workers = workers;
        self
    }

    pub fn projects_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.projects.root = root.into();
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.path = Some(path.into());
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace.root = Some(root.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.executor.timeout_secs = Some(secs);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Task`; defaults to an `ansible-playbook` run of `site.yml`.
pub struct TaskBuilder {
    id: Option<String>,
    command: String,
    project_id: String,
    parameters: TaskParameters,
}

impl TaskBuilder {
    pub fn new(project_id: &str) -> Self {
        Self {
            id: None,
            command: ANSIBLE_PLAYBOOK.to_string(),
            project_id: project_id.to_string(),
            parameters: PlaybookParameters::new("site.yml").into(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.command = command.to_string();
        self
    }

    pub fn playbook(mut self, playbook: &str) -> Self {
        self.parameters = PlaybookParameters::new(playbook).into();
        self
    }

    pub fn parameters(mut self, parameters: TaskParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn build(self) -> Arc<Task> {
        let task = match self.id {
            Some(id) => Task::with_id(id, self.command, self.project_id, self.parameters),
            None => Task::new(self.command, self.project_id, self.parameters),
        };
        Arc::new(task)
    }
}

/// In-memory filesystem with a catalog and a fully wired workspace builder.
///
/// Projects live under `/projects`, working dirs under `/work`.
pub struct MockWorkspace {
    pub fs: Arc<MockFileSystem>,
    pub catalog: Arc<ProjectCatalog>,
    pub builder: Arc<WorkspaceBuilder>,
}

pub const MOCK_PROJECTS_ROOT: &str = "/projects";
pub const MOCK_WORK_ROOT: &str = "/work";

impl MockWorkspace {
    pub fn new() -> Self {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_dir(MOCK_PROJECTS_ROOT);
        let dyn_fs: Arc<dyn FileSystem> = fs.clone();

        let catalog = Arc::new(ProjectCatalog::new(Arc::clone(&dyn_fs)).with_root(MOCK_PROJECTS_ROOT));
        let builder = WorkspaceBuilder::new(Arc::clone(&dyn_fs))
            .with_root(MOCK_WORK_ROOT)
            .with_fetchers(Arc::new(FetcherRegistry::with_defaults(Arc::clone(&dyn_fs))))
            .with_unpackers(Arc::new(UnpackerRegistry::with_defaults(dyn_fs)))
            .with_catalog(Arc::clone(&catalog));

        Self {
            fs,
            catalog,
            builder: Arc::new(builder),
        }
    }

    /// Add a plain project `name` containing `site.yml` and register it.
    pub fn with_plain_project(self, name: &str) -> Self {
        let dir = Path::new(MOCK_PROJECTS_ROOT).join(name);
        self.fs.add_file(dir.join("site.yml"), "- hosts: all\n");
        self.catalog
            .safe_store(name, Project::local_plain(name, dir))
            .expect("register mock project");
        self
    }

    pub fn working_dir(&self, project: &str, task: &str) -> PathBuf {
        Path::new(MOCK_WORK_ROOT).join(project).join(task)
    }

    pub fn dyn_fs(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
