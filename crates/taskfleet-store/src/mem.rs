use crate::TaskStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use taskfleet_core::{
    AgentMessage, Artifact, FleetError, FleetResult, RoleOutput, Subtask, SubtaskStatus, Task,
    TaskStatus,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    tasks: HashMap<Uuid, Task>,
    subtasks: HashMap<Uuid, Subtask>,
    messages: HashMap<Uuid, AgentMessage>,
}

/// In-memory [`TaskStore`] behind a single `RwLock`, which makes every
/// mutation trivially atomic. Suitable for tests and single-process runs.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// New empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> FleetResult<()> {
        let mut inner = self.inner.write().await;
        inner.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> FleetResult<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.get(&id).cloned())
    }

    async fn pending_tasks(&self, limit: usize) -> FleetResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: Option<String>,
    ) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return Ok(false);
        };
        if task.status.is_terminal() {
            return Ok(false);
        }
        task.status = status;
        task.error = error;
        task.updated_at = Utc::now();
        if status == TaskStatus::Completed {
            task.completed_at = Some(task.updated_at);
        }
        Ok(true)
    }

    async fn attach_artifacts(&self, id: Uuid, artifacts: Vec<Artifact>) -> FleetResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or_else(|| FleetError::Store(format!("unknown task {id}")))?;
        task.artifacts.extend(artifacts);
        Ok(())
    }

    async fn insert_subtasks(&self, subtasks: Vec<Subtask>) -> FleetResult<()> {
        let mut inner = self.inner.write().await;
        for subtask in subtasks {
            inner.subtasks.insert(subtask.id, subtask);
        }
        Ok(())
    }

    async fn get_subtask(&self, id: Uuid) -> FleetResult<Option<Subtask>> {
        let inner = self.inner.read().await;
        Ok(inner.subtasks.get(&id).cloned())
    }

    async fn subtasks_for_task(&self, task_id: Uuid) -> FleetResult<Vec<Subtask>> {
        let inner = self.inner.read().await;
        let mut subtasks: Vec<Subtask> = inner
            .subtasks
            .values()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect();
        subtasks.sort_by_key(|s| s.sequence);
        Ok(subtasks)
    }

    async fn assign_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(subtask) = inner.subtasks.get_mut(&id) else {
            return Ok(false);
        };
        if subtask.status != SubtaskStatus::Pending {
            return Ok(false);
        }
        subtask.status = SubtaskStatus::Assigned;
        Ok(true)
    }

    async fn claim_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(subtask) = inner.subtasks.get_mut(&id) else {
            return Ok(false);
        };
        if subtask.status != SubtaskStatus::Assigned {
            return Ok(false);
        }
        subtask.status = SubtaskStatus::InProgress;
        Ok(true)
    }

    async fn complete_subtask(&self, id: Uuid, output: RoleOutput) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(subtask) = inner.subtasks.get_mut(&id) else {
            return Ok(false);
        };
        if subtask.status != SubtaskStatus::InProgress {
            return Ok(false);
        }
        subtask.status = SubtaskStatus::Completed;
        subtask.output = Some(output);
        Ok(true)
    }

    async fn fail_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(subtask) = inner.subtasks.get_mut(&id) else {
            return Ok(false);
        };
        if matches!(
            subtask.status,
            SubtaskStatus::Completed | SubtaskStatus::Failed
        ) {
            return Ok(false);
        }
        subtask.status = SubtaskStatus::Failed;
        Ok(true)
    }

    async fn incomplete_count(&self, task_id: Uuid) -> FleetResult<usize> {
        let inner = self.inner.read().await;
        Ok(inner
            .subtasks
            .values()
            .filter(|s| s.task_id == task_id && s.status != SubtaskStatus::Completed)
            .count())
    }

    async fn insert_message(&self, message: AgentMessage) -> FleetResult<()> {
        let mut inner = self.inner.write().await;
        inner.messages.insert(message.id, message);
        Ok(())
    }

    async fn undelivered_messages(&self) -> FleetResult<Vec<AgentMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<AgentMessage> = inner
            .messages
            .values()
            .filter(|m| !m.delivered)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn mark_delivered(&self, id: Uuid) -> FleetResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(message) = inner.messages.get_mut(&id) else {
            return Ok(false);
        };
        if message.delivered {
            return Ok(false);
        }
        message.delivered = true;
        Ok(true)
    }

    async fn messages_for_task(&self, task_id: Uuid) -> FleetResult<Vec<AgentMessage>> {
        let inner = self.inner.read().await;
        let mut messages: Vec<AgentMessage> = inner
            .messages
            .values()
            .filter(|m| m.task_id == task_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}
