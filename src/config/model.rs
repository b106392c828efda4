// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::ansible::DEFAULT_BINARY;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [dispatcher]
/// workers = 4
///
/// [projects]
/// root = "/srv/playbooks"
///
/// [store]
/// path = "/var/lib/playbookd/projects"
///
/// [workspace]
/// root = "/var/tmp/playbookd"
///
/// [executor]
/// binary = "ansible-playbook"
/// timeout_secs = 600
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    #[serde(default)]
    pub projects: ProjectsSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub workspace: WorkspaceSection,

    #[serde(default)]
    pub executor: ExecutorSection,
}

/// `[dispatcher]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherSection {
    /// Number of workers, i.e. how many playbooks may run at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// `[projects]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectsSection {
    /// Directory scanned for projects at startup. Subdirectories become
    /// `plain` projects, `*.tar.gz` files become `targz` projects.
    #[serde(default = "default_projects_root")]
    pub root: PathBuf,
}

fn default_projects_root() -> PathBuf {
    PathBuf::from("projects")
}

impl Default for ProjectsSection {
    fn default() -> Self {
        Self {
            root: default_projects_root(),
        }
    }
}

/// `[store]` section.
///
/// When `path` is set the project catalog is persisted there as one record
/// file per project; otherwise it lives in memory only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// `[workspace]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Parent of all working directories; defaults to `<temp dir>/playbookd`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// `[executor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSection {
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Per-task execution limit in seconds; unlimited when absent.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: None,
        }
    }
}

impl ExecutorSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`, so holders
/// can rely on the checks in `validate.rs` having passed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub dispatcher: DispatcherSection,
    pub projects: ProjectsSection,
    pub store: StoreSection,
    pub workspace: WorkspaceSection,
    pub executor: ExecutorSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            dispatcher: raw.dispatcher,
            projects: raw.projects,
            store: raw.store,
            workspace: raw.workspace,
            executor: raw.executor,
        }
    }
}
