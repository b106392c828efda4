// src/task/store.rs

//! Thread-safe in-memory index of tasks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::errors::{PlaybookdError, Result};

use super::{Task, TaskId};

/// Index of every task submitted to this process.
///
/// One mutex guards the whole map; entries are `Arc<Task>` so lookups hand
/// out shared references and never copy task state.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<Task>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace.
    pub fn store(&self, task: Arc<Task>) {
        debug!(task = %task.id(), "storing task");
        self.lock().insert(task.id().to_string(), task);
    }

    /// Insert only if no task with the same id exists.
    pub fn safe_store(&self, task: Arc<Task>) -> Result<()> {
        let mut tasks = self.lock();
        if tasks.contains_key(task.id()) {
            return Err(PlaybookdError::AlreadyExists {
                entity: "task",
                id: task.id().to_string(),
            });
        }
        debug!(task = %task.id(), "storing new task");
        tasks.insert(task.id().to_string(), task);
        Ok(())
    }

    pub fn find(&self, id: &str) -> Result<Arc<Task>> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| PlaybookdError::TaskNotFound(id.to_string()))
    }

    /// All tasks, oldest first.
    pub fn find_all(&self) -> Vec<Arc<Task>> {
        let mut tasks: Vec<Arc<Task>> = self.lock().values().cloned().collect();
        tasks.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        tasks
    }

    pub fn remove(&self, id: &str) -> Result<Arc<Task>> {
        self.lock()
            .remove(id)
            .ok_or_else(|| PlaybookdError::TaskNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
