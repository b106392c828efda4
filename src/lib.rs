// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod project;
pub mod service;
pub mod store;
pub mod task;
pub mod types;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{CliArgs, CliCommand, RunArgs};
use crate::config::{ConfigFile, load_and_validate};
use crate::dispatch::{Dispatcher, DispatcherConfig};
use crate::exec::{AnsiblePlaybookExecutor, PlaybookExecutor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::project::ProjectCatalog;
use crate::service::TaskService;
use crate::store::RecordStore;
use crate::task::{TaskSnapshot, TaskStatus, TaskStore};
use crate::workspace::{FetcherRegistry, UnpackerRegistry, WorkspaceBuilder};

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when at least one submitted task did not succeed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let catalog = Arc::new(open_catalog(&cfg, Arc::clone(&fs))?);
    let loaded = catalog
        .load_projects()
        .with_context(|| format!("loading projects from {}", cfg.projects.root.display()))?;
    info!(loaded, total = catalog.len(), root = ?cfg.projects.root, "project catalog ready");

    match args.command {
        CliCommand::Projects => {
            let projects: Vec<_> = catalog.find_all().into_iter().map(|(_, p)| p).collect();
            println!("{}", serde_json::to_string_pretty(&projects)?);
            Ok(true)
        }
        CliCommand::Run(run_args) => run_playbooks(&cfg, fs, catalog, run_args).await,
    }
}

/// Catalog rooted at `[projects].root`, persisted under `[store].path` when
/// one is configured.
pub fn open_catalog(cfg: &ConfigFile, fs: Arc<dyn FileSystem>) -> Result<ProjectCatalog> {
    let catalog = ProjectCatalog::new(Arc::clone(&fs)).with_root(cfg.projects.root.clone());
    let Some(path) = &cfg.store.path else {
        return Ok(catalog);
    };

    let store = RecordStore::open(fs, path.clone())
        .with_context(|| format!("opening project store {}", path.display()))?;
    Ok(catalog.with_store(store)?)
}

/// Workspace builder with the default adapters registered.
pub fn workspace_builder(
    cfg: &ConfigFile,
    fs: Arc<dyn FileSystem>,
    catalog: Arc<ProjectCatalog>,
) -> WorkspaceBuilder {
    let builder = WorkspaceBuilder::new(Arc::clone(&fs))
        .with_fetchers(Arc::new(FetcherRegistry::with_defaults(Arc::clone(&fs))))
        .with_unpackers(Arc::new(UnpackerRegistry::with_defaults(fs)))
        .with_catalog(catalog);

    match &cfg.workspace.root {
        Some(root) => builder.with_root(root.clone()),
        None => builder,
    }
}

async fn run_playbooks(
    cfg: &ConfigFile,
    fs: Arc<dyn FileSystem>,
    catalog: Arc<ProjectCatalog>,
    args: RunArgs,
) -> Result<bool> {
    let workspaces = Arc::new(workspace_builder(cfg, fs, catalog));
    let executor: Arc<dyn PlaybookExecutor> =
        Arc::new(AnsiblePlaybookExecutor::new(cfg.executor.binary.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig {
            workers: cfg.dispatcher.workers,
            task_timeout: cfg.executor.timeout(),
        },
        workspaces,
        executor,
    ));

    let ctx = CancellationToken::new();
    dispatcher.start(ctx.clone()).await?;

    // Ctrl-C → graceful shutdown.
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; finishing running tasks");
            ctx.cancel();
        });
    }

    let service = TaskService::new(Arc::new(TaskStore::new()), Arc::clone(&dispatcher));
    let mut submitted = Vec::with_capacity(args.playbooks.len());
    for playbook in &args.playbooks {
        let params = args.parameters_for(playbook);
        match service
            .submit(&args.command, &args.project, params.into())
            .await
        {
            Ok(task) => submitted.push(task),
            Err(err) => {
                warn!(playbook = %playbook, error = %err, "submission refused; not submitting the rest");
                break;
            }
        }
    }

    for task in &submitted {
        task.wait_finished().await;
    }
    dispatcher.shutdown().await;

    let snapshots: Vec<TaskSnapshot> = service.find_all().iter().map(|t| t.snapshot()).collect();
    println!("{}", serde_json::to_string_pretty(&snapshots)?);

    let failed = snapshots
        .iter()
        .filter(|s| s.status != TaskStatus::Success)
        .count();
    info!(total = snapshots.len(), failed, "run finished");
    Ok(failed == 0 && submitted.len() == args.playbooks.len())
}
