// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::task::{ANSIBLE_PLAYBOOK, PlaybookParameters};

/// Command-line arguments for `playbookd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "playbookd",
    version,
    about = "Run Ansible playbooks against catalogued projects with a bounded worker pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "playbookd.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLAYBOOKD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Load the project catalog and list it as JSON.
    Projects,

    /// Run one or more playbooks of a project and wait for them to finish.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Project to run against.
    #[arg(long, value_name = "ID")]
    pub project: String,

    /// Playbook file, relative to the project root. One task per playbook.
    #[arg(long = "playbook", value_name = "FILE", required = true)]
    pub playbooks: Vec<String>,

    #[arg(long = "inventory", value_name = "INVENTORY")]
    pub inventories: Vec<String>,

    /// Extra variable passed as `--extra-vars KEY=VALUE`.
    #[arg(long = "extra-var", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub extra_vars: Vec<(String, String)>,

    #[arg(long, value_name = "PATTERN")]
    pub limit: Option<String>,

    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Dry run (`ansible-playbook --check`).
    #[arg(long)]
    pub check: bool,

    /// Task command; only `ansible-playbook` is executable.
    #[arg(long, value_name = "COMMAND", default_value = ANSIBLE_PLAYBOOK)]
    pub command: String,
}

impl RunArgs {
    /// Parameters for one of the requested playbooks; every other flag is
    /// shared by all of them.
    pub fn parameters_for(&self, playbook: &str) -> PlaybookParameters {
        PlaybookParameters {
            playbook: playbook.to_string(),
            inventory: self.inventories.clone(),
            extra_vars: self.extra_vars.iter().cloned().collect(),
            limit: self.limit.clone(),
            tags: self.tags.clone(),
            check: self.check,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

