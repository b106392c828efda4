use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

use playbookd::errors::PlaybookdError;
use playbookd::exec::{ExecFuture, PlaybookExecutor};
use playbookd::fs::FileSystem;
use playbookd::task::PlaybookParameters;

/// One call observed by [`RecordingExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorCall {
    pub working_dir: PathBuf,
    pub playbook: String,
    /// Whether the playbook file existed in the working dir when the run
    /// started; `None` without a probe filesystem.
    pub playbook_present: Option<bool>,
}

/// A fake executor that:
/// - records every call
/// - tracks how many runs are in flight at once
/// - sleeps for a configurable delay, then succeeds or fails.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    delay: Duration,
    fail_with: Option<String>,
    probe: Option<Arc<dyn FileSystem>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    calls: Mutex<Vec<ExecutorCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, reason: &str) -> Self {
        self.fail_with = Some(reason.to_string());
        self
    }

    /// Check for the playbook file through `fs` on every call.
    pub fn with_probe(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.probe = Some(fs);
        self
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of simultaneous runs observed.
    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    async fn run_inner(
        &self,
        cancel: CancellationToken,
        working_dir: &Path,
        params: &PlaybookParameters,
    ) -> playbookd::errors::Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let playbook_present = self
            .probe
            .as_ref()
            .map(|fs| fs.exists(&working_dir.join(&params.playbook)));
        self.calls.lock().unwrap().push(ExecutorCall {
            working_dir: working_dir.to_path_buf(),
            playbook: params.playbook.clone(),
            playbook_present,
        });

        let cancelled = tokio::select! {
            _ = tokio::time::sleep(self.delay) => false,
            _ = cancel.cancelled() => true,
        };
        self.running.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            return Err(PlaybookdError::Other(anyhow!("fake run cancelled")));
        }
        match &self.fail_with {
            Some(reason) => Err(PlaybookdError::Other(anyhow!("{reason}"))),
            None => Ok(()),
        }
    }
}

impl PlaybookExecutor for RecordingExecutor {
    fn run<'a>(
        &'a self,
        cancel: CancellationToken,
        working_dir: &'a Path,
        params: &'a PlaybookParameters,
    ) -> ExecFuture<'a> {
        Box::pin(self.run_inner(cancel, working_dir, params))
    }
}
