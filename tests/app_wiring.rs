// tests/app_wiring.rs

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use playbookd::dispatch::{Dispatcher, DispatcherConfig};
use playbookd::exec::PlaybookExecutor;
use playbookd::fs::{FileSystem, RealFileSystem};
use playbookd::service::TaskService;
use playbookd::task::{PlaybookParameters, TaskStatus, TaskStore, ANSIBLE_PLAYBOOK};
use playbookd::{open_catalog, workspace_builder};
use playbookd_test_utils::builders::ConfigFileBuilder;
use playbookd_test_utils::fake_executor::RecordingExecutor;
use playbookd_test_utils::wait_terminal;

use crate::common::{init_tracing, write_plain_project, write_targz_project};

#[tokio::test]
async fn configured_stack_runs_both_project_formats() {
    init_tracing();
    let projects = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    write_plain_project(projects.path(), "web", &[("site.yml", "- hosts: web\n")]);
    write_targz_project(projects.path(), "db", &[("site.yml", "- hosts: db\n")]);

    let cfg = ConfigFileBuilder::new()
        .workers(2)
        .projects_root(projects.path())
        .store_path(state.path().join("projects"))
        .workspace_root(work.path())
        .build();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let catalog = Arc::new(open_catalog(&cfg, Arc::clone(&fs)).unwrap());
    assert_eq!(catalog.load_projects().unwrap(), 2);
    assert!(state.path().join("projects").join("web").is_file());

    let executor = Arc::new(RecordingExecutor::new().with_probe(Arc::clone(&fs)));
    let executor_dyn: Arc<dyn PlaybookExecutor> = executor.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig {
            workers: cfg.dispatcher.workers,
            task_timeout: cfg.executor.timeout(),
        },
        Arc::new(workspace_builder(&cfg, Arc::clone(&fs), catalog)),
        executor_dyn,
    ));
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let service = TaskService::new(Arc::new(TaskStore::new()), Arc::clone(&dispatcher));
    let mut tasks = Vec::new();
    for project in ["web", "db"] {
        tasks.push(
            service
                .submit(ANSIBLE_PLAYBOOK, project, PlaybookParameters::new("site.yml").into())
                .await
                .unwrap(),
        );
    }
    for task in &tasks {
        assert_eq!(wait_terminal(task).await, TaskStatus::Success, "{:?}", task.snapshot());
    }
    dispatcher.shutdown().await;

    let calls = executor.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.playbook_present == Some(true)));
    assert!(calls.iter().all(|c| c.working_dir.starts_with(work.path())));
    assert!(calls.iter().all(|c| !c.working_dir.exists()));

    // A second process sees the persisted catalog before scanning.
    let reopened = open_catalog(&cfg, fs).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.load_projects().unwrap(), 0);
}
