// src/dispatch/dispatcher.rs

//! Bounded worker pool fed from a task queue.
//!
//! `execute` pushes onto the queue. A dispatch loop pops a task, waits for an
//! idle worker to offer its private channel on the pool, and hands the task
//! over. Queue order is preserved and at most `workers` tasks run at once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{PlaybookdError, Result};
use crate::exec::PlaybookExecutor;
use crate::task::Task;
use crate::workspace::WorkspaceBuilder;

use super::worker::{TaskSender, Worker};

/// Reason recorded on tasks still queued when the dispatcher stops.
pub const ABANDONED_REASON: &str = "dispatcher stopped before the task was executed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Pool size; values below 1 are raised to 1.
    pub workers: usize,
    /// Per-task execution limit.
    pub task_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            task_timeout: None,
        }
    }
}

pub struct Dispatcher {
    config: DispatcherConfig,
    workspaces: Arc<WorkspaceBuilder>,
    executor: Arc<dyn PlaybookExecutor>,
    started: AtomicBool,
    stopped: AtomicBool,
    start_guard: tokio::sync::Mutex<()>,
    queue: Mutex<Option<mpsc::Sender<Arc<Task>>>>,
    stop: CancellationToken,
    done: CancellationToken,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        workspaces: Arc<WorkspaceBuilder>,
        executor: Arc<dyn PlaybookExecutor>,
    ) -> Self {
        let config = DispatcherConfig {
            workers: config.workers.max(1),
            ..config
        };
        Self {
            config,
            workspaces,
            executor,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            start_guard: tokio::sync::Mutex::new(()),
            queue: Mutex::new(None),
            stop: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// False once stopped, whether through [`stop`](Self::stop) or the
    /// start context being cancelled.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst)
            && !self.stopped.load(Ordering::SeqCst)
            && !self.done.is_cancelled()
    }

    /// Start the workers and the dispatch loop.
    ///
    /// A second call is a no-op. Concurrent callers wait until the first one
    /// has finished, so every `Ok` return leaves the dispatcher accepting
    /// tasks. Cancelling `ctx` stops the dispatcher the same way
    /// [`stop`](Self::stop) does.
    pub async fn start(&self, ctx: CancellationToken) -> Result<()> {
        let _guard = self.start_guard.lock().await;

        if self.stopped.load(Ordering::SeqCst) || self.done.is_cancelled() {
            return Err(PlaybookdError::DispatcherNotRunning);
        }
        if self.started.load(Ordering::SeqCst) {
            debug!("dispatcher already started");
            return Ok(());
        }

        let workers = self.config.workers;
        let (queue_tx, queue_rx) = mpsc::channel::<Arc<Task>>(workers);
        let (pool_tx, pool_rx) = mpsc::channel::<TaskSender>(workers);
        let worker_stop = CancellationToken::new();

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(id, Arc::clone(&self.workspaces), Arc::clone(&self.executor))
                .with_timeout(self.config.task_timeout);
            match worker.start(pool_tx.clone(), worker_stop.clone()) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    error!(worker = id, error = %err, "worker failed to start");
                    worker_stop.cancel();
                    join_workers(handles).await;
                    self.started.store(true, Ordering::SeqCst);
                    self.stopped.store(true, Ordering::SeqCst);
                    self.done.cancel();
                    return Err(err);
                }
            }
        }
        drop(pool_tx);

        *self.lock_queue() = Some(queue_tx);

        let dispatch = DispatchLoop {
            queue: queue_rx,
            pool: pool_rx,
            ctx,
            stop: self.stop.clone(),
            worker_stop,
            handles,
            done: self.done.clone(),
        };
        tokio::spawn(dispatch.run());
        self.started.store(true, Ordering::SeqCst);

        info!(workers, timeout = ?self.config.task_timeout, "dispatcher started");
        Ok(())
    }

    /// Request shutdown. Running tasks finish; queued ones are failed.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.lock_queue().take();
        self.stop.cancel();
        debug!("dispatcher stop requested");
    }

    /// Wait until the dispatch loop and every worker have exited.
    pub async fn wait(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        self.done.cancelled().await;
    }

    pub async fn shutdown(&self) {
        self.stop();
        self.wait().await;
    }

    /// Enqueue a task. Blocks while the queue is full.
    pub async fn execute(&self, task: Arc<Task>) -> Result<()> {
        if self.done.is_cancelled() {
            return Err(PlaybookdError::DispatcherNotRunning);
        }
        let queue = self
            .lock_queue()
            .clone()
            .ok_or(PlaybookdError::DispatcherNotRunning)?;

        let id = task.id().to_string();
        queue
            .send(task)
            .await
            .map_err(|_| PlaybookdError::DispatcherNotRunning)?;
        debug!(task = %id, "task queued");
        Ok(())
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<Arc<Task>>>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct DispatchLoop {
    queue: mpsc::Receiver<Arc<Task>>,
    pool: mpsc::Receiver<TaskSender>,
    ctx: CancellationToken,
    stop: CancellationToken,
    worker_stop: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    done: CancellationToken,
}

impl DispatchLoop {
    async fn run(mut self) {
        loop {
            let task = tokio::select! {
                biased;

                _ = self.ctx.cancelled() => break,
                _ = self.stop.cancelled() => break,
                task = self.queue.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            let worker = tokio::select! {
                biased;

                _ = self.ctx.cancelled() => {
                    abandon(&task);
                    break;
                }
                _ = self.stop.cancelled() => {
                    abandon(&task);
                    break;
                }
                worker = self.pool.recv() => match worker {
                    Some(worker) => worker,
                    None => {
                        abandon(&task);
                        break;
                    }
                },
            };

            debug!(task = %task.id(), "handing task to worker");
            if let Err(mpsc::error::SendError(task)) = worker.send(task).await {
                warn!(task = %task.id(), "worker went away before accepting the task");
                abandon(&task);
            }
        }

        self.worker_stop.cancel();
        join_workers(std::mem::take(&mut self.handles)).await;

        self.queue.close();
        let mut abandoned = 0usize;
        while let Ok(task) = self.queue.try_recv() {
            abandon(&task);
            abandoned += 1;
        }

        self.done.cancel();
        info!(abandoned, "dispatcher stopped");
    }
}

async fn join_workers(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(err) = handle.await {
            error!(error = %err, "worker task panicked");
        }
    }
}

fn abandon(task: &Task) {
    if let Err(err) = task.mark_failed(ABANDONED_REASON) {
        debug!(task = %task.id(), error = %err, "queued task already finished");
    }
}
