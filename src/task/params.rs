// src/task/params.rs

//! Command-specific task payloads.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PlaybookdError;

/// Wire name of the only command currently understood by workers.
pub const ANSIBLE_PLAYBOOK: &str = "ansible-playbook";

/// Commands a worker knows how to execute.
///
/// Tasks keep the caller's raw command string; workers parse it with
/// [`FromStr`] so an unknown command fails the task instead of being
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AnsiblePlaybook,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::AnsiblePlaybook => ANSIBLE_PLAYBOOK,
        }
    }
}

impl FromStr for Command {
    type Err = PlaybookdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ANSIBLE_PLAYBOOK => Ok(Command::AnsiblePlaybook),
            other => Err(PlaybookdError::UnknownCommand(other.to_string())),
        }
    }
}

/// Payload attached to a task, one variant per command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum TaskParameters {
    /// The submitter supplied no payload.
    None,
    AnsiblePlaybook(PlaybookParameters),
}

impl TaskParameters {
    pub fn as_playbook(&self) -> Option<&PlaybookParameters> {
        match self {
            TaskParameters::AnsiblePlaybook(params) => Some(params),
            TaskParameters::None => None,
        }
    }
}

impl From<PlaybookParameters> for TaskParameters {
    fn from(params: PlaybookParameters) -> Self {
        TaskParameters::AnsiblePlaybook(params)
    }
}

/// Arguments for an `ansible-playbook` run, relative to the working dir.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookParameters {
    /// Playbook file, e.g. `site.yml`.
    pub playbook: String,

    #[serde(default)]
    pub inventory: Vec<String>,

    #[serde(default)]
    pub extra_vars: BTreeMap<String, String>,

    #[serde(default)]
    pub limit: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Dry run (`--check`).
    #[serde(default)]
    pub check: bool,
}

impl PlaybookParameters {
    pub fn new(playbook: impl Into<String>) -> Self {
        Self {
            playbook: playbook.into(),
            ..Default::default()
        }
    }

    /// Command-line arguments, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for inventory in &self.inventory {
            args.push("--inventory".to_string());
            args.push(inventory.clone());
        }
        if let Some(limit) = &self.limit {
            args.push("--limit".to_string());
            args.push(limit.clone());
        }
        if !self.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(self.tags.join(","));
        }
        for (key, value) in &self.extra_vars {
            args.push("--extra-vars".to_string());
            args.push(format!("{key}={value}"));
        }
        if self.check {
            args.push("--check".to_string());
        }
        args.push(self.playbook.clone());
        args
    }
}
