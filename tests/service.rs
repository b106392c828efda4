// tests/service.rs

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use playbookd::dispatch::{Dispatcher, DispatcherConfig};
use playbookd::errors::PlaybookdError;
use playbookd::exec::PlaybookExecutor;
use playbookd::service::TaskService;
use playbookd::task::{PlaybookParameters, TaskStatus, TaskStore, ANSIBLE_PLAYBOOK};
use playbookd_test_utils::builders::MockWorkspace;
use playbookd_test_utils::fake_executor::RecordingExecutor;
use playbookd_test_utils::wait_terminal;

fn service(env: &MockWorkspace) -> (TaskService, Arc<Dispatcher>) {
    let executor: Arc<dyn PlaybookExecutor> = Arc::new(RecordingExecutor::new());
    let dispatcher = Arc::new(Dispatcher::new(
        DispatcherConfig::default(),
        Arc::clone(&env.builder),
        executor,
    ));
    let service = TaskService::new(Arc::new(TaskStore::new()), Arc::clone(&dispatcher));
    (service, dispatcher)
}

#[tokio::test]
async fn submitted_tasks_are_stored_and_run() {
    let env = MockWorkspace::new().with_plain_project("web");
    let (service, dispatcher) = service(&env);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = service
        .submit(ANSIBLE_PLAYBOOK, "web", PlaybookParameters::new("site.yml").into())
        .await
        .unwrap();
    assert_eq!(wait_terminal(&task).await, TaskStatus::Success);

    let found = service.find(task.id()).unwrap();
    assert!(Arc::ptr_eq(&found, &task));
    assert_eq!(service.find_all().len(), 1);

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn refused_submission_is_kept_as_failed() {
    let env = MockWorkspace::new().with_plain_project("web");
    let (service, _dispatcher) = service(&env);

    let err = service
        .submit(ANSIBLE_PLAYBOOK, "web", PlaybookParameters::new("site.yml").into())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybookdError::DispatcherNotRunning));

    let all = service.find_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status(), TaskStatus::Failed);
    assert_eq!(
        all[0].error_message().as_deref(),
        Some("dispatcher is not running")
    );
}

#[tokio::test]
async fn unknown_task_lookup_is_not_found() {
    let env = MockWorkspace::new();
    let (service, _dispatcher) = service(&env);
    assert!(matches!(
        service.find("nope"),
        Err(PlaybookdError::TaskNotFound(_))
    ));
}
