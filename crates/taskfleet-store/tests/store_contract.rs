//! Behavioral contract shared by every [`TaskStore`] implementation.
//!
//! Each test runs once per backend so MemoryStore and SqliteStore cannot
//! drift apart on the compare-and-set and terminal-state guarantees the
//! engine relies on.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use taskfleet_core::{
    AgentMessage, AgentRole, Artifact, RoleOutput, Subtask, SubtaskStatus, Task, TaskStatus,
};
use taskfleet_store::{MemoryStore, SqliteStore, TaskStore};
use uuid::Uuid;

fn backends() -> Vec<(&'static str, Box<dyn TaskStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

fn assigned_subtask(task_id: Uuid, sequence: u32) -> Subtask {
    let mut st = Subtask::new(
        task_id,
        Uuid::new_v4(),
        AgentRole::Coder,
        "write the module",
        "build_bay",
        sequence,
    );
    st.status = SubtaskStatus::Assigned;
    st
}

#[tokio::test]
async fn test_task_round_trip() {
    for (name, store) in backends() {
        let task = Task::new("build a landing page", Some("user-7".into()));
        store.insert_task(task.clone()).await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap().expect(name);
        assert_eq!(loaded.id, task.id);
        assert_eq!(loaded.prompt, task.prompt);
        assert_eq!(loaded.submitted_by, task.submitted_by);
        assert_eq!(loaded.status, TaskStatus::Pending);
        assert!(loaded.artifacts.is_empty());

        assert!(store.get_task(Uuid::new_v4()).await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_pending_tasks_oldest_first_with_limit() {
    for (name, store) in backends() {
        let mut first = Task::new("first", None);
        let mut second = Task::new("second", None);
        let mut third = Task::new("third", None);
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(30);
        second.created_at = chrono::Utc::now() - chrono::Duration::seconds(20);
        third.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        // Insert out of order; the query must sort by creation time.
        store.insert_task(third.clone()).await.unwrap();
        store.insert_task(first.clone()).await.unwrap();
        store.insert_task(second.clone()).await.unwrap();

        let pending = store.pending_tasks(2).await.unwrap();
        assert_eq!(pending.len(), 2, "{name}");
        assert_eq!(pending[0].id, first.id, "{name}");
        assert_eq!(pending[1].id, second.id, "{name}");

        // Non-pending tasks never show up.
        assert!(store
            .set_task_status(first.id, TaskStatus::Planning, None)
            .await
            .unwrap());
        let pending = store.pending_tasks(10).await.unwrap();
        assert_eq!(pending.len(), 2, "{name}");
        assert_eq!(pending[0].id, second.id, "{name}");
    }
}

#[tokio::test]
async fn test_terminal_task_status_is_final() {
    for (name, store) in backends() {
        let task = Task::new("doomed", None);
        store.insert_task(task.clone()).await.unwrap();

        assert!(store
            .set_task_status(task.id, TaskStatus::Cancelled, None)
            .await
            .unwrap());
        // A late completion of a cancelled task is discarded.
        assert!(
            !store
                .set_task_status(task.id, TaskStatus::Completed, None)
                .await
                .unwrap(),
            "{name}"
        );
        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Cancelled, "{name}");

        // Unknown ids report false rather than erroring.
        assert!(!store
            .set_task_status(Uuid::new_v4(), TaskStatus::Failed, None)
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn test_completion_stamps_completed_at_and_failure_keeps_error() {
    for (name, store) in backends() {
        let task = Task::new("finishes", None);
        store.insert_task(task.clone()).await.unwrap();
        store
            .set_task_status(task.id, TaskStatus::Completed, None)
            .await
            .unwrap();
        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert!(loaded.completed_at.is_some(), "{name}");

        let failing = Task::new("breaks", None);
        store.insert_task(failing.clone()).await.unwrap();
        store
            .set_task_status(failing.id, TaskStatus::Failed, Some("no plan produced".into()))
            .await
            .unwrap();
        let loaded = store.get_task(failing.id).await.unwrap().unwrap();
        assert_eq!(loaded.error.as_deref(), Some("no plan produced"), "{name}");
        assert!(loaded.completed_at.is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_artifacts_accumulate() {
    for (name, store) in backends() {
        let task = Task::new("ships artifacts", None);
        store.insert_task(task.clone()).await.unwrap();

        store
            .attach_artifacts(task.id, vec![Artifact::new("bundle", "file:///tmp/a.zip")])
            .await
            .unwrap();
        store
            .attach_artifacts(task.id, vec![Artifact::new("report", "file:///tmp/b.txt")])
            .await
            .unwrap();

        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.artifacts.len(), 2, "{name}");
        assert_eq!(loaded.artifacts[0].label, "bundle", "{name}");
        assert_eq!(loaded.artifacts[1].locator, "file:///tmp/b.txt", "{name}");
    }
}

#[tokio::test]
async fn test_subtasks_ordered_by_sequence() {
    for (name, store) in backends() {
        let task = Task::new("three steps", None);
        store.insert_task(task.clone()).await.unwrap();
        let batch = vec![
            assigned_subtask(task.id, 2),
            assigned_subtask(task.id, 0),
            assigned_subtask(task.id, 1),
        ];
        store.insert_subtasks(batch).await.unwrap();

        let loaded = store.subtasks_for_task(task.id).await.unwrap();
        let sequences: Vec<u32> = loaded.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2], "{name}");
        assert_eq!(store.incomplete_count(task.id).await.unwrap(), 3, "{name}");
    }
}

#[tokio::test]
async fn test_assign_subtask_is_exactly_once() {
    for (name, store) in backends() {
        let task = Task::new("assignable", None);
        store.insert_task(task.clone()).await.unwrap();
        let st = Subtask::new(
            task.id,
            Uuid::new_v4(),
            AgentRole::Coder,
            "write the module",
            "build_bay",
            0,
        );
        store.insert_subtasks(vec![st.clone()]).await.unwrap();

        // A planned step cannot be claimed before it is assigned.
        assert!(!store.claim_subtask(st.id).await.unwrap(), "{name}");

        assert!(store.assign_subtask(st.id).await.unwrap(), "{name}");
        assert!(!store.assign_subtask(st.id).await.unwrap(), "{name}");
        let loaded = store.get_subtask(st.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SubtaskStatus::Assigned, "{name}");

        assert!(store.claim_subtask(st.id).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_claim_subtask_is_exactly_once() {
    for (name, store) in backends() {
        let task = Task::new("claimable", None);
        store.insert_task(task.clone()).await.unwrap();
        let st = assigned_subtask(task.id, 0);
        store.insert_subtasks(vec![st.clone()]).await.unwrap();

        assert!(store.claim_subtask(st.id).await.unwrap(), "{name}");
        // Second claim loses the race.
        assert!(!store.claim_subtask(st.id).await.unwrap(), "{name}");
        let loaded = store.get_subtask(st.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SubtaskStatus::InProgress, "{name}");
    }
}

#[tokio::test]
async fn test_complete_subtask_requires_in_progress() {
    for (name, store) in backends() {
        let task = Task::new("completable", None);
        store.insert_task(task.clone()).await.unwrap();
        let st = assigned_subtask(task.id, 0);
        store.insert_subtasks(vec![st.clone()]).await.unwrap();

        let output = RoleOutput::Design {
            spec: "two-column layout".into(),
        };
        // Not claimed yet: the completion is rejected.
        assert!(
            !store.complete_subtask(st.id, output.clone()).await.unwrap(),
            "{name}"
        );

        store.claim_subtask(st.id).await.unwrap();
        assert!(store.complete_subtask(st.id, output.clone()).await.unwrap());
        assert!(!store.complete_subtask(st.id, output).await.unwrap(), "{name}");

        let loaded = store.get_subtask(st.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SubtaskStatus::Completed, "{name}");
        assert!(matches!(loaded.output, Some(RoleOutput::Design { .. })), "{name}");
        assert_eq!(store.incomplete_count(task.id).await.unwrap(), 0, "{name}");
    }
}

#[tokio::test]
async fn test_fail_subtask_respects_terminal_states() {
    for (name, store) in backends() {
        let task = Task::new("fails", None);
        store.insert_task(task.clone()).await.unwrap();
        let st = assigned_subtask(task.id, 0);
        store.insert_subtasks(vec![st.clone()]).await.unwrap();

        assert!(store.fail_subtask(st.id).await.unwrap(), "{name}");
        assert!(!store.fail_subtask(st.id).await.unwrap(), "{name}");

        let done = assigned_subtask(task.id, 1);
        store.insert_subtasks(vec![done.clone()]).await.unwrap();
        store.claim_subtask(done.id).await.unwrap();
        store
            .complete_subtask(
                done.id,
                RoleOutput::Text {
                    content: "done".into(),
                },
            )
            .await
            .unwrap();
        // A completed subtask cannot be failed afterwards.
        assert!(!store.fail_subtask(done.id).await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_message_delivery_is_at_most_once() {
    for (name, store) in backends() {
        let task = Task::new("chatty", None);
        store.insert_task(task.clone()).await.unwrap();
        let msg = AgentMessage::new(
            task.id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "which font did we pick?",
            "lounge",
        );
        store.insert_message(msg.clone()).await.unwrap();

        let pending = store.undelivered_messages().await.unwrap();
        assert_eq!(pending.len(), 1, "{name}");
        assert_eq!(pending[0].id, msg.id, "{name}");

        assert!(store.mark_delivered(msg.id).await.unwrap(), "{name}");
        assert!(!store.mark_delivered(msg.id).await.unwrap(), "{name}");
        assert!(store.undelivered_messages().await.unwrap().is_empty(), "{name}");

        let all = store.messages_for_task(task.id).await.unwrap();
        assert_eq!(all.len(), 1, "{name}");
        assert!(all[0].delivered, "{name}");
    }
}

#[tokio::test]
async fn test_sqlite_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.db");
    let task = Task::new("survives restart", Some("user-2".into()));
    let st = {
        let store = SqliteStore::open(&path).unwrap();
        store.insert_task(task.clone()).await.unwrap();
        let st = assigned_subtask(task.id, 0);
        store.insert_subtasks(vec![st.clone()]).await.unwrap();
        store.claim_subtask(st.id).await.unwrap();
        st
    };

    let store = SqliteStore::open(&path).unwrap();
    let loaded = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(loaded.prompt, "survives restart");
    let loaded_st = store.get_subtask(st.id).await.unwrap().unwrap();
    assert_eq!(loaded_st.status, SubtaskStatus::InProgress);
}
