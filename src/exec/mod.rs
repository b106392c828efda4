// src/exec/mod.rs

//! Playbook execution layer.
//!
//! - [`backend`] provides the `PlaybookExecutor` trait workers call.
//! - [`ansible`] implements it by spawning `ansible-playbook` with
//!   `tokio::process::Command`.

pub mod ansible;
pub mod backend;

pub use ansible::AnsiblePlaybookExecutor;
pub use backend::{ExecFuture, PlaybookExecutor};
