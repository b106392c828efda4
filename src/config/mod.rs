// src/config/mod.rs

//! Configuration loading and validation for playbookd.
//!
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a config file from disk.
//! - `validate.rs` turns the raw model into a checked [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DispatcherSection, ExecutorSection, ProjectsSection, RawConfigFile, StoreSection,
    WorkspaceSection,
};
