// src/exec/backend.rs

//! Pluggable playbook executor abstraction.
//!
//! Workers talk to a `PlaybookExecutor` instead of spawning processes
//! themselves. Production code uses
//! [`AnsiblePlaybookExecutor`](super::AnsiblePlaybookExecutor); tests provide
//! their own implementation that records calls and never touches a process.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::task::PlaybookParameters;

/// Boxed future returned by [`PlaybookExecutor::run`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Runs a playbook inside a prepared working directory.
///
/// The core does not interpret errors beyond recording them as the task's
/// failure reason. Implementations should stop promptly once `cancel` fires.
pub trait PlaybookExecutor: Send + Sync {
    fn run<'a>(
        &'a self,
        cancel: CancellationToken,
        working_dir: &'a Path,
        params: &'a PlaybookParameters,
    ) -> ExecFuture<'a>;
}
