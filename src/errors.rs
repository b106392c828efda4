// src/errors.rs

//! Crate-wide error type, its classification, and the `Result` alias.
//!
//! Every failure carries the context needed to diagnose it without log
//! correlation (which project, which task, which stage).

use std::fmt;

use thiserror::Error;

/// Stage of workspace preparation or execution that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateWorkingDir,
    Fetch,
    Unpack,
    Execute,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::CreateWorkingDir => "create working dir",
            Stage::Fetch => "fetch",
            Stage::Unpack => "unpack",
            Stage::Execute => "execute",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(s)
    }
}

/// Coarse classification of [`PlaybookdError`].
///
/// Callers branch on this instead of matching individual variants, e.g. to
/// tell "does not exist" apart from "exists but is corrupted".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required collaborator or setting is missing or invalid. Never retried.
    Configuration,
    NotFound,
    /// Persisted data failed hash verification.
    Integrity,
    /// Something that must be unique already exists.
    Collision,
    /// Fetch, unpack or executor failure.
    External,
    /// Operation not valid in the current lifecycle state.
    State,
    Io,
}

#[derive(Error, Debug)]
pub enum PlaybookdError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0} not provided")]
    NotProvided(&'static str),

    #[error("no {kind} registered for '{key}'")]
    Unregistered { kind: &'static str, key: String },

    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error("record '{0}' not found")]
    RecordNotFound(String),

    #[error("record '{id}' is corrupted: stored hash {stored} does not match computed hash {computed}")]
    RecordCorrupted {
        id: String,
        stored: String,
        computed: String,
    },

    #[error("invalid record id '{0}'")]
    InvalidRecordId(String),

    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("{stage} failed for project '{project}' task '{task}': {source:#}")]
    StageFailed {
        stage: Stage,
        project: String,
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid parameters for command '{0}'")]
    InvalidParameters(String),

    #[error("task '{id}' cannot transition from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: crate::task::TaskStatus,
        to: crate::task::TaskStatus,
    },

    #[error("workspace for task '{0}' has not been prepared")]
    WorkspaceNotPrepared(String),

    #[error("dispatcher is not running")]
    DispatcherNotRunning,

    #[error("worker {id} failed to start: {reason}")]
    WorkerStart { id: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaybookdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybookdError::ConfigError(_)
            | PlaybookdError::NotProvided(_)
            | PlaybookdError::Unregistered { .. }
            | PlaybookdError::InvalidRecordId(_)
            | PlaybookdError::UnknownCommand(_)
            | PlaybookdError::InvalidParameters(_)
            | PlaybookdError::WorkerStart { .. }
            | PlaybookdError::TomlError(_) => ErrorKind::Configuration,
            PlaybookdError::ProjectNotFound(_)
            | PlaybookdError::TaskNotFound(_)
            | PlaybookdError::RecordNotFound(_) => ErrorKind::NotFound,
            PlaybookdError::RecordCorrupted { .. } | PlaybookdError::JsonError(_) => {
                ErrorKind::Integrity
            }
            PlaybookdError::AlreadyExists { .. } => ErrorKind::Collision,
            PlaybookdError::StageFailed { .. } | PlaybookdError::Other(_) => ErrorKind::External,
            PlaybookdError::InvalidTransition { .. }
            | PlaybookdError::WorkspaceNotPrepared(_)
            | PlaybookdError::DispatcherNotRunning => ErrorKind::State,
            PlaybookdError::IoError(_) => ErrorKind::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn stage(
        stage: Stage,
        project: impl Into<String>,
        task: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        PlaybookdError::StageFailed {
            stage,
            project: project.into(),
            task: task.into(),
            source: source.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlaybookdError>;
