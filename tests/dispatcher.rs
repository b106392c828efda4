// tests/dispatcher.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use playbookd::dispatch::{Dispatcher, DispatcherConfig, Worker, ABANDONED_REASON};
use playbookd::errors::PlaybookdError;
use playbookd::exec::PlaybookExecutor;
use playbookd::fs::FileSystem;
use playbookd::task::{TaskParameters, TaskStatus};
use playbookd_test_utils::builders::{MockWorkspace, TaskBuilder};
use playbookd_test_utils::fake_executor::RecordingExecutor;
use playbookd_test_utils::{wait_terminal, with_timeout};

use crate::common::init_tracing;

fn dispatcher(
    env: &MockWorkspace,
    executor: Arc<RecordingExecutor>,
    workers: usize,
) -> Dispatcher {
    let executor: Arc<dyn PlaybookExecutor> = executor;
    Dispatcher::new(
        DispatcherConfig {
            workers,
            task_timeout: None,
        },
        Arc::clone(&env.builder),
        executor,
    )
}

#[tokio::test]
async fn successful_task_runs_in_transient_working_dir() {
    init_tracing();
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().with_probe(env.dyn_fs()));
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("web").id("t1").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Success);
    let snap = task.snapshot();
    assert!(snap.executed_at.is_some());
    assert!(snap.completed_at.is_some());
    assert!(snap.error_message.is_none());

    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].working_dir, env.working_dir("web", "t1"));
    assert_eq!(calls[0].playbook, "site.yml");
    assert_eq!(calls[0].playbook_present, Some(true));

    dispatcher.shutdown().await;
    assert!(!env.fs.exists(&env.working_dir("web", "t1")));
}

#[tokio::test]
async fn missing_project_fails_without_running() {
    init_tracing();
    let env = MockWorkspace::new();
    let executor = Arc::new(RecordingExecutor::new());
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("ghost").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Failed);
    assert!(task.error_message().unwrap().contains("not found"));
    assert_eq!(executor.call_count(), 0);
    assert!(task.snapshot().executed_at.is_none());

    dispatcher.shutdown().await;
}

#[tokio::test]
async fn unsupported_command_never_reaches_running() {
    init_tracing();
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new());
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("web").id("t1").command("terraform").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Failed);
    let reason = task.error_message().unwrap();
    assert!(reason.contains("unknown command"), "{reason}");
    assert!(task.snapshot().executed_at.is_none());
    assert_eq!(executor.call_count(), 0);

    dispatcher.shutdown().await;
    assert!(!env.fs.exists(&env.working_dir("web", "t1")));
}

#[tokio::test]
async fn wrong_parameters_fail_the_task() {
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new());
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("web").parameters(TaskParameters::None).build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Failed);
    assert!(task.error_message().unwrap().contains("invalid parameters"));
    assert_eq!(executor.call_count(), 0);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn executor_failure_is_recorded_and_dir_removed() {
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().failing("exit status 2"));
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("web").id("t1").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Failed);
    let reason = task.error_message().unwrap();
    assert!(reason.contains("execute failed"), "{reason}");
    assert!(reason.contains("exit status 2"), "{reason}");
    assert!(task.snapshot().executed_at.is_some());

    dispatcher.shutdown().await;
    assert!(!env.fs.exists(&env.working_dir("web", "t1")));
}

#[tokio::test]
async fn single_worker_serialises_tasks() {
    init_tracing();
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(30)));
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let tasks: Vec<_> = (0..4).map(|_| TaskBuilder::new("web").build()).collect();
    for task in &tasks {
        dispatcher.execute(Arc::clone(task)).await.unwrap();
    }
    for task in &tasks {
        assert_eq!(wait_terminal(task).await, TaskStatus::Success);
    }

    assert_eq!(executor.call_count(), 4);
    assert_eq!(executor.max_running(), 1);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn pool_bounds_concurrency() {
    init_tracing();
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(50)));
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 3);
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let tasks: Vec<_> = (0..10).map(|_| TaskBuilder::new("web").build()).collect();
    for task in &tasks {
        dispatcher.execute(Arc::clone(task)).await.unwrap();
    }
    for task in &tasks {
        assert_eq!(wait_terminal(task).await, TaskStatus::Success);
    }

    assert_eq!(executor.call_count(), 10);
    assert!(executor.max_running() <= 3, "max running {}", executor.max_running());
    assert!(executor.max_running() >= 2, "pool never ran tasks in parallel");
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new());
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 2);

    let ctx = CancellationToken::new();
    dispatcher.start(ctx.clone()).await.unwrap();
    dispatcher.start(ctx.clone()).await.unwrap();
    assert!(dispatcher.is_running());

    let task = TaskBuilder::new("web").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();
    assert_eq!(wait_terminal(&task).await, TaskStatus::Success);
    assert_eq!(executor.call_count(), 1);

    dispatcher.stop();
    dispatcher.stop();
    with_timeout(dispatcher.wait()).await;
    assert!(!dispatcher.is_running());

    assert!(matches!(
        dispatcher.execute(TaskBuilder::new("web").build()).await,
        Err(PlaybookdError::DispatcherNotRunning)
    ));
    assert!(matches!(
        dispatcher.start(ctx).await,
        Err(PlaybookdError::DispatcherNotRunning)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_start_returns_only_once_ready() {
    for _ in 0..50 {
        let env = MockWorkspace::new().with_plain_project("web");
        let executor = Arc::new(RecordingExecutor::new());
        let dispatcher = Arc::new(dispatcher(&env, Arc::clone(&executor), 8));
        let ctx = CancellationToken::new();

        let starters: Vec<_> = (0..2)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    dispatcher.start(ctx).await.unwrap();
                    let task = TaskBuilder::new("web").build();
                    dispatcher.execute(Arc::clone(&task)).await.map(|_| task)
                })
            })
            .collect();

        for starter in starters {
            let task = with_timeout(starter).await.unwrap().unwrap();
            assert_eq!(wait_terminal(&task).await, TaskStatus::Success);
        }
        assert_eq!(executor.call_count(), 2);
        with_timeout(dispatcher.shutdown()).await;
    }
}

#[tokio::test]
async fn cancelled_context_marks_dispatcher_stopped() {
    let env = MockWorkspace::new().with_plain_project("web");
    let dispatcher = dispatcher(&env, Arc::new(RecordingExecutor::new()), 1);
    let ctx = CancellationToken::new();
    dispatcher.start(ctx.clone()).await.unwrap();
    assert!(dispatcher.is_running());

    ctx.cancel();
    with_timeout(dispatcher.wait()).await;

    assert!(!dispatcher.is_running());
    assert!(matches!(
        dispatcher.start(CancellationToken::new()).await,
        Err(PlaybookdError::DispatcherNotRunning)
    ));
    assert!(matches!(
        dispatcher.execute(TaskBuilder::new("web").build()).await,
        Err(PlaybookdError::DispatcherNotRunning)
    ));
}

#[tokio::test]
async fn execute_before_start_is_refused() {
    let env = MockWorkspace::new();
    let dispatcher = dispatcher(&env, Arc::new(RecordingExecutor::new()), 1);

    let task = TaskBuilder::new("web").build();
    let err = dispatcher.execute(Arc::clone(&task)).await.unwrap_err();
    assert!(matches!(err, PlaybookdError::DispatcherNotRunning));
    assert_eq!(task.status(), TaskStatus::Pending);

    // Nothing to wait for.
    with_timeout(dispatcher.wait()).await;
}

#[tokio::test]
async fn cancelled_context_finishes_running_and_fails_queued() {
    init_tracing();
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(200)));
    let dispatcher = dispatcher(&env, Arc::clone(&executor), 1);
    let ctx = CancellationToken::new();
    dispatcher.start(ctx.clone()).await.unwrap();

    let first = TaskBuilder::new("web").build();
    dispatcher.execute(Arc::clone(&first)).await.unwrap();
    let mut running = first.subscribe();
    with_timeout(running.wait_for(|s| *s == TaskStatus::Running))
        .await
        .unwrap();

    let queued = TaskBuilder::new("web").build();
    dispatcher.execute(Arc::clone(&queued)).await.unwrap();

    ctx.cancel();
    with_timeout(dispatcher.wait()).await;

    assert_eq!(first.status(), TaskStatus::Success);
    assert_eq!(queued.status(), TaskStatus::Failed);
    assert_eq!(queued.error_message().as_deref(), Some(ABANDONED_REASON));
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn timeout_cancels_the_executor() {
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_secs(30)));
    let executor_dyn: Arc<dyn PlaybookExecutor> = executor.clone();
    let dispatcher = Dispatcher::new(
        DispatcherConfig {
            workers: 1,
            task_timeout: Some(Duration::from_millis(50)),
        },
        Arc::clone(&env.builder),
        executor_dyn,
    );
    dispatcher.start(CancellationToken::new()).await.unwrap();

    let task = TaskBuilder::new("web").build();
    dispatcher.execute(Arc::clone(&task)).await.unwrap();

    assert_eq!(wait_terminal(&task).await, TaskStatus::Failed);
    assert!(task.error_message().unwrap().contains("timed out"));
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn worker_processes_a_task_directly() {
    let env = MockWorkspace::new().with_plain_project("web");
    let executor = Arc::new(RecordingExecutor::new());
    let executor_dyn: Arc<dyn PlaybookExecutor> = executor.clone();
    let worker = Worker::new(7, Arc::clone(&env.builder), executor_dyn);
    assert_eq!(worker.id(), 7);

    let task = TaskBuilder::new("web").id("t1").build();
    worker.process(Arc::clone(&task)).await;

    assert_eq!(task.status(), TaskStatus::Success);
    assert_eq!(executor.call_count(), 1);
    let fs: Arc<dyn FileSystem> = env.dyn_fs();
    assert!(!fs.exists(&env.working_dir("web", "t1")));
}

#[tokio::test]
async fn zero_workers_is_raised_to_one() {
    let env = MockWorkspace::new();
    let dispatcher = dispatcher(&env, Arc::new(RecordingExecutor::new()), 0);
    assert_eq!(dispatcher.config().workers, 1);
}
