// src/task/mod.rs

//! Task entity and its status state machine.
//!
//! A [`Task`] is shared as `Arc<Task>` between the task store (query path)
//! and whichever worker currently owns it. The immutable request fields are
//! plain struct fields; everything that changes during execution lives behind
//! a per-task mutex so readers never observe a half-applied transition.

pub mod params;
pub mod store;

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{PlaybookdError, Result};

pub use params::{Command, PlaybookParameters, TaskParameters, ANSIBLE_PLAYBOOK};
pub use store::TaskStore;

pub type TaskId = String;

/// Lifecycle of a task. Variants are declared in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Accepted,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal move.
    ///
    /// Moves only go forward (skipping is fine, e.g. `Accepted -> Failed`)
    /// and nothing leaves a terminal state. `Success` and `Failed` are
    /// alternatives, not steps, so neither reaches the other.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next > *self
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
struct TaskState {
    status: TaskStatus,
    executed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

/// One requested execution of a command against a project.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    command: String,
    project_id: String,
    parameters: TaskParameters,
    created_at: DateTime<Utc>,
    state: Mutex<TaskState>,
    status_tx: watch::Sender<TaskStatus>,
}

/// Consistent, serialisable view of a task at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub command: String,
    pub project_id: String,
    pub parameters: TaskParameters,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Task {
    /// Create a `Pending` task with a fresh id.
    pub fn new(
        command: impl Into<String>,
        project_id: impl Into<String>,
        parameters: TaskParameters,
    ) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), command, project_id, parameters)
    }

    pub fn with_id(
        id: impl Into<TaskId>,
        command: impl Into<String>,
        project_id: impl Into<String>,
        parameters: TaskParameters,
    ) -> Self {
        let (status_tx, _) = watch::channel(TaskStatus::Pending);
        Self {
            id: id.into(),
            command: command.into(),
            project_id: project_id.into(),
            parameters,
            created_at: Utc::now(),
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                executed_at: None,
                completed_at: None,
                error_message: None,
            }),
            status_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn parameters(&self) -> &TaskParameters {
        &self.parameters
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        // Transitions are validated before anything is written, so the state
        // behind a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    pub fn error_message(&self) -> Option<String> {
        self.lock().error_message.clone()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.lock().clone();
        TaskSnapshot {
            id: self.id.clone(),
            command: self.command.clone(),
            project_id: self.project_id.clone(),
            parameters: self.parameters.clone(),
            status: state.status,
            created_at: self.created_at,
            executed_at: state.executed_at,
            completed_at: state.completed_at,
            error_message: state.error_message,
        }
    }

    pub fn mark_accepted(&self) -> Result<()> {
        self.transition(TaskStatus::Accepted, None)
    }

    pub fn mark_running(&self) -> Result<()> {
        self.transition(TaskStatus::Running, None)
    }

    pub fn mark_success(&self) -> Result<()> {
        self.transition(TaskStatus::Success, None)
    }

    pub fn mark_failed(&self, reason: impl Into<String>) -> Result<()> {
        self.transition(TaskStatus::Failed, Some(reason.into()))
    }

    fn transition(&self, next: TaskStatus, error_message: Option<String>) -> Result<()> {
        let mut state = self.lock();
        if !state.status.can_transition_to(next) {
            return Err(PlaybookdError::InvalidTransition {
                id: self.id.clone(),
                from: state.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            TaskStatus::Running => state.executed_at = Some(now),
            TaskStatus::Success | TaskStatus::Failed => state.completed_at = Some(now),
            TaskStatus::Pending | TaskStatus::Accepted => {}
        }
        debug!(task = %self.id, from = %state.status, to = %next, "task transition");
        state.status = next;
        state.error_message = error_message;

        // Published while still holding the lock so watchers see transitions
        // in the order they were applied.
        self.status_tx.send_replace(next);
        Ok(())
    }

    /// Subscribe to status changes. The receiver starts at the current status.
    pub fn subscribe(&self) -> watch::Receiver<TaskStatus> {
        self.status_tx.subscribe()
    }

    /// Wait until the task reaches `Success` or `Failed`.
    pub async fn wait_finished(&self) -> TaskStatus {
        let mut rx = self.subscribe();
        // The sender lives inside `self`, so the channel cannot close while
        // we are borrowing it.
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }
}
