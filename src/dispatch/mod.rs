// src/dispatch/mod.rs

//! Task dispatch.
//!
//! - [`dispatcher`] owns the queue, the idle-worker pool and the dispatch loop.
//! - [`worker`] drives a single task through its state machine.

pub mod dispatcher;
pub mod worker;

pub use dispatcher::{ABANDONED_REASON, Dispatcher, DispatcherConfig};
pub use worker::{TaskSender, Worker};
