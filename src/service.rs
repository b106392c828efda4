// src/service.rs

//! Entry point for submitting and querying tasks.

use std::sync::Arc;

use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::errors::Result;
use crate::task::{Task, TaskParameters, TaskStore};

#[derive(Debug, Clone)]
pub struct TaskService {
    tasks: Arc<TaskStore>,
    dispatcher: Arc<Dispatcher>,
}

impl TaskService {
    pub fn new(tasks: Arc<TaskStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { tasks, dispatcher }
    }

    /// Create a task, record it and hand it to the dispatcher.
    ///
    /// If the dispatcher refuses it the task stays in the store as `Failed`
    /// and the refusal is returned.
    pub async fn submit(
        &self,
        command: impl Into<String>,
        project_id: impl Into<String>,
        parameters: TaskParameters,
    ) -> Result<Arc<Task>> {
        let task = Arc::new(Task::new(command, project_id, parameters));
        self.tasks.safe_store(Arc::clone(&task))?;

        if let Err(err) = self.dispatcher.execute(Arc::clone(&task)).await {
            warn!(task = %task.id(), error = %err, "task rejected by dispatcher");
            let _ = task.mark_failed(err.to_string());
            return Err(err);
        }

        info!(task = %task.id(), project = %task.project_id(), command = %task.command(), "task submitted");
        Ok(task)
    }

    pub fn find(&self, id: &str) -> Result<Arc<Task>> {
        self.tasks.find(id)
    }

    pub fn find_all(&self) -> Vec<Arc<Task>> {
        self.tasks.find_all()
    }
}
