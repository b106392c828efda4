// src/dispatch/worker.rs

//! A single pool worker: runs one task at a time from acceptance to its
//! final status.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{PlaybookdError, Result, Stage};
use crate::exec::PlaybookExecutor;
use crate::task::{Command, Task};
use crate::workspace::{Workspace, WorkspaceBuilder};

/// Private channel a worker receives tasks on.
pub type TaskSender = mpsc::Sender<Arc<Task>>;

pub struct Worker {
    id: usize,
    workspaces: Arc<WorkspaceBuilder>,
    executor: Arc<dyn PlaybookExecutor>,
    timeout: Option<Duration>,
}

impl Worker {
    pub fn new(
        id: usize,
        workspaces: Arc<WorkspaceBuilder>,
        executor: Arc<dyn PlaybookExecutor>,
    ) -> Self {
        Self {
            id,
            workspaces,
            executor,
            timeout: None,
        }
    }

    /// Cancel the executor if a run takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Register with the idle pool and spawn the worker loop.
    ///
    /// The worker offers its private channel on `pool` whenever it is idle:
    /// once at start, then again after each finished task. It exits when
    /// `stop` fires while it is idle, or when the pool closes.
    pub fn start(
        self,
        pool: mpsc::Sender<TaskSender>,
        stop: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let (tx, rx) = mpsc::channel::<Arc<Task>>(1);
        pool.try_send(tx.clone())
            .map_err(|e| PlaybookdError::WorkerStart {
                id: self.id,
                reason: e.to_string(),
            })?;

        Ok(tokio::spawn(self.run_loop(rx, tx, pool, stop)))
    }

    async fn run_loop(
        self,
        mut rx: mpsc::Receiver<Arc<Task>>,
        tx: TaskSender,
        pool: mpsc::Sender<TaskSender>,
        stop: CancellationToken,
    ) {
        info!(worker = self.id, "worker started");

        loop {
            tokio::select! {
                // A task already handed to us wins over a stop request.
                biased;

                task = rx.recv() => {
                    let Some(task) = task else {
                        break;
                    };
                    self.process(task).await;

                    if pool.send(tx.clone()).await.is_err() {
                        debug!(worker = self.id, "worker pool closed");
                        break;
                    }
                }

                _ = stop.cancelled() => break,
            }
        }

        info!(worker = self.id, "worker stopped");
    }

    /// Drive `task` to `Success` or `Failed`, then tear down its workspace.
    ///
    /// Never returns an error: every failure becomes the task's failure
    /// reason.
    pub async fn process(&self, task: Arc<Task>) {
        info!(worker = self.id, task = %task.id(), project = %task.project_id(), command = %task.command(), "processing task");

        let mut workspace = None;
        let outcome = self.execute(&task, &mut workspace).await;

        let finalised = match &outcome {
            Ok(()) => task.mark_success(),
            Err(err) => task.mark_failed(err.to_string()),
        };
        if let Err(err) = finalised {
            error!(worker = self.id, task = %task.id(), error = %err, "could not finalise task status");
        }

        match &outcome {
            Ok(()) => info!(worker = self.id, task = %task.id(), "task succeeded"),
            Err(err) => warn!(worker = self.id, task = %task.id(), error = %err, "task failed"),
        }

        if let Some(workspace) = workspace.filter(Workspace::is_created) {
            self.cleanup(workspace).await;
        }
    }

    async fn execute(&self, task: &Arc<Task>, slot: &mut Option<Workspace>) -> Result<()> {
        task.mark_accepted()?;

        let workspace = self.workspaces.with_task(Arc::clone(task)).build();
        let (workspace, prepared) = tokio::task::spawn_blocking(move || {
            let mut workspace = workspace;
            let prepared = workspace.prepare();
            (workspace, prepared)
        })
        .await
        .map_err(|e| anyhow!("workspace preparation aborted: {e}"))?;

        let workspace = slot.insert(workspace);
        prepared?;
        let working_dir = workspace.working_dir()?.to_path_buf();

        let command: Command = task.command().parse()?;
        let params = match command {
            Command::AnsiblePlaybook => task
                .parameters()
                .as_playbook()
                .ok_or_else(|| PlaybookdError::InvalidParameters(command.as_str().to_string()))?,
        };

        task.mark_running()?;
        let cancel = CancellationToken::new();
        let mut run = self.executor.run(cancel.clone(), &working_dir, params);

        let result = match self.timeout {
            None => run.await,
            Some(limit) => tokio::select! {
                result = &mut run => result,
                _ = tokio::time::sleep(limit) => {
                    warn!(worker = self.id, task = %task.id(), ?limit, "execution timed out; cancelling");
                    cancel.cancel();
                    let _ = run.await;
                    Err(PlaybookdError::Other(anyhow!("timed out after {:?}", limit)))
                }
            },
        };

        result.map_err(|e| PlaybookdError::stage(Stage::Execute, task.project_id(), task.id(), e))
    }

    async fn cleanup(&self, workspace: Workspace) {
        let task_id = workspace.task().id().to_string();
        let cleaned = tokio::task::spawn_blocking(move || {
            let mut workspace = workspace;
            workspace.cleanup()
        })
        .await;

        match cleaned {
            Ok(Ok(())) => debug!(worker = self.id, task = %task_id, "workspace cleaned up"),
            Ok(Err(err)) => {
                warn!(worker = self.id, task = %task_id, error = %err, "workspace cleanup failed")
            }
            Err(err) => {
                warn!(worker = self.id, task = %task_id, error = %err, "workspace cleanup aborted")
            }
        }
    }
}
