// tests/task_state.rs

use std::sync::Arc;

use playbookd::errors::{ErrorKind, PlaybookdError};
use playbookd::task::{PlaybookParameters, Task, TaskParameters, TaskStatus, ANSIBLE_PLAYBOOK};
use playbookd_test_utils::builders::TaskBuilder;
use playbookd_test_utils::with_timeout;

#[test]
fn new_task_is_pending_with_fresh_id() {
    let a = TaskBuilder::new("web").build();
    let b = TaskBuilder::new("web").build();

    assert_eq!(a.status(), TaskStatus::Pending);
    assert_ne!(a.id(), b.id());
    assert_eq!(a.command(), ANSIBLE_PLAYBOOK);
    assert_eq!(a.project_id(), "web");
    assert!(a.error_message().is_none());

    let snap = a.snapshot();
    assert!(snap.executed_at.is_none());
    assert!(snap.completed_at.is_none());
}

#[test]
fn happy_path_stamps_times() {
    let task = TaskBuilder::new("web").build();

    task.mark_accepted().unwrap();
    task.mark_running().unwrap();
    let running = task.snapshot();
    assert_eq!(running.status, TaskStatus::Running);
    assert!(running.executed_at.is_some());
    assert!(running.completed_at.is_none());

    task.mark_success().unwrap();
    let done = task.snapshot();
    assert_eq!(done.status, TaskStatus::Success);
    assert!(done.completed_at.unwrap() >= done.executed_at.unwrap());
    assert!(done.error_message.is_none());
}

#[test]
fn failure_records_reason() {
    let task = TaskBuilder::new("web").build();
    task.mark_accepted().unwrap();
    task.mark_failed("boom").unwrap();

    assert_eq!(task.status(), TaskStatus::Failed);
    assert_eq!(task.error_message().as_deref(), Some("boom"));
    assert!(task.snapshot().completed_at.is_some());
}

#[test]
fn pending_task_can_fail_directly() {
    let task = TaskBuilder::new("web").build();
    task.mark_failed("refused").unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
}

#[test]
fn status_never_moves_backwards() {
    let task = TaskBuilder::new("web").id("t1").build();
    task.mark_accepted().unwrap();
    task.mark_running().unwrap();

    let err = task.mark_accepted().unwrap_err();
    assert!(matches!(
        err,
        PlaybookdError::InvalidTransition {
            from: TaskStatus::Running,
            to: TaskStatus::Accepted,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(task.status(), TaskStatus::Running);
}

#[test]
fn terminal_status_is_final() {
    let task = TaskBuilder::new("web").build();
    task.mark_accepted().unwrap();
    task.mark_running().unwrap();
    task.mark_success().unwrap();

    assert!(task.mark_failed("late").is_err());
    assert!(task.mark_success().is_err());
    assert_eq!(task.status(), TaskStatus::Success);
    assert!(task.error_message().is_none());
}

#[test]
fn transition_table() {
    use TaskStatus::*;
    let all = [Pending, Accepted, Running, Success, Failed];

    for from in all {
        for to in all {
            let expected = !from.is_terminal() && to > from;
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "{from:?} -> {to:?}"
            );
        }
    }
}

#[test]
fn snapshot_serialises_status_uppercase() {
    let task = Task::with_id(
        "t1",
        ANSIBLE_PLAYBOOK,
        "web",
        PlaybookParameters::new("site.yml").into(),
    );
    let json = serde_json::to_value(task.snapshot()).unwrap();

    assert_eq!(json["id"], "t1");
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["project_id"], "web");
    assert_eq!(json["parameters"]["kind"], "ansible-playbook");
    assert_eq!(json["parameters"]["value"]["playbook"], "site.yml");
}

#[test]
fn playbook_arguments_put_playbook_last() {
    let mut params = PlaybookParameters::new("site.yml");
    params.inventory = vec!["hosts.ini".into()];
    params.extra_vars.insert("env".into(), "prod".into());
    params.limit = Some("web*".into());
    params.tags = vec!["deploy".into(), "db".into()];
    params.check = true;

    let args = params.to_args();
    assert_eq!(args.last().map(String::as_str), Some("site.yml"));
    assert!(args.windows(2).any(|w| w == ["--inventory", "hosts.ini"]));
    assert!(args.windows(2).any(|w| w == ["--limit", "web*"]));
    assert!(args.windows(2).any(|w| w == ["--tags", "deploy,db"]));
    assert!(args.windows(2).any(|w| w == ["--extra-vars", "env=prod"]));
    assert!(args.contains(&"--check".to_string()));
}

#[test]
fn none_parameters_are_not_a_playbook() {
    assert!(TaskParameters::None.as_playbook().is_none());
    let params: TaskParameters = PlaybookParameters::new("a.yml").into();
    assert_eq!(params.as_playbook().unwrap().playbook, "a.yml");
}

#[tokio::test]
async fn wait_finished_wakes_on_terminal_status() {
    let task = TaskBuilder::new("web").build();
    let waiter = {
        let task = Arc::clone(&task);
        tokio::spawn(async move { task.wait_finished().await })
    };

    task.mark_accepted().unwrap();
    task.mark_running().unwrap();
    task.mark_failed("nope").unwrap();

    let status = with_timeout(waiter).await.unwrap();
    assert_eq!(status, TaskStatus::Failed);
}
