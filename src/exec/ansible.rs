// src/exec/ansible.rs

//! `ansible-playbook` process runner.

use std::path::Path;
use std::process::Stdio;

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{PlaybookdError, Result};
use crate::task::PlaybookParameters;

use super::backend::{ExecFuture, PlaybookExecutor};

pub const DEFAULT_BINARY: &str = "ansible-playbook";

/// Spawns the `ansible-playbook` binary in the working directory.
///
/// stdout is logged at info, stderr at debug. A non-zero exit status is an
/// error carrying the exit code. If the cancel token fires the child is
/// killed and the run fails.
#[derive(Debug, Clone)]
pub struct AnsiblePlaybookExecutor {
    binary: String,
}

impl Default for AnsiblePlaybookExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl AnsiblePlaybookExecutor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run_inner(
        &self,
        cancel: CancellationToken,
        working_dir: &Path,
        params: &PlaybookParameters,
    ) -> Result<()> {
        let args = params.to_args();
        info!(
            binary = %self.binary,
            dir = ?working_dir,
            ?args,
            "starting playbook process"
        );

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning '{}'", self.binary))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, params.playbook.clone(), false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, params.playbook.clone(), true));
        }

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("waiting for '{}'", self.binary))?;
                let code = status.code().unwrap_or(-1);
                info!(playbook = %params.playbook, exit_code = code, success = status.success(), "playbook process exited");
                if status.success() {
                    Ok(())
                } else {
                    Err(PlaybookdError::Other(anyhow!(
                        "{} exited with status {}",
                        self.binary,
                        code
                    )))
                }
            }
            _ = cancel.cancelled() => {
                warn!(playbook = %params.playbook, "cancellation requested; killing playbook process");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill playbook process");
                }
                Err(PlaybookdError::Other(anyhow!("{} cancelled", self.binary)))
            }
        }
    }
}

async fn forward_lines<R>(stream: R, playbook: String, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            debug!(playbook = %playbook, "stderr: {}", line);
        } else {
            info!(playbook = %playbook, "{}", line);
        }
    }
}

impl PlaybookExecutor for AnsiblePlaybookExecutor {
    fn run<'a>(
        &'a self,
        cancel: CancellationToken,
        working_dir: &'a Path,
        params: &'a PlaybookParameters,
    ) -> ExecFuture<'a> {
        Box::pin(self.run_inner(cancel, working_dir, params))
    }
}
