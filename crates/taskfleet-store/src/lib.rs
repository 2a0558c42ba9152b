//! Persistence layer for Taskfleet.
//!
//! The engine talks to storage through the [`TaskStore`] trait: per-entity
//! CRUD plus the handful of aggregate queries the tick phases poll, and
//! the compare-and-set mutations that give the scheduler its idempotency
//! guarantees (`assign_subtask`, `claim_subtask`, `mark_delivered`).
//! Every mutation is atomic; no mutation touches a task once it is
//! terminal.
//!
//! Two implementations: [`MemoryStore`] (default, used by tests and
//! single-process runs) and [`SqliteStore`] (rusqlite, bundled).

/// In-memory store.
pub mod mem;
/// SQLite-backed store.
pub mod sqlite;

pub use mem::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use taskfleet_core::{
    AgentMessage, Artifact, FleetResult, RoleOutput, Subtask, Task, TaskStatus,
};
use uuid::Uuid;

/// Storage contract for tasks, subtasks, and inter-agent messages.
#[async_trait]
pub trait TaskStore: Send + Sync {
    // --- Tasks ---

    /// Persist a newly submitted task.
    async fn insert_task(&self, task: Task) -> FleetResult<()>;

    /// Fetch a task by id.
    async fn get_task(&self, id: Uuid) -> FleetResult<Option<Task>>;

    /// Pending tasks, oldest first, at most `limit`.
    async fn pending_tasks(&self, limit: usize) -> FleetResult<Vec<Task>>;

    /// Move a task to a new status, recording the error detail for
    /// failures.
    ///
    /// Returns `false` without mutating when the task is missing or
    /// already terminal — terminal states are final, so a late completion
    /// of a cancelled task is a no-op.
    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: Option<String>,
    ) -> FleetResult<bool>;

    /// Attach artifact references to a task.
    async fn attach_artifacts(&self, id: Uuid, artifacts: Vec<Artifact>) -> FleetResult<()>;

    // --- Subtasks ---

    /// Insert a planned batch of subtasks.
    async fn insert_subtasks(&self, subtasks: Vec<Subtask>) -> FleetResult<()>;

    /// Fetch a subtask by id.
    async fn get_subtask(&self, id: Uuid) -> FleetResult<Option<Subtask>>;

    /// Subtasks of a task ordered by sequence index.
    async fn subtasks_for_task(&self, task_id: Uuid) -> FleetResult<Vec<Subtask>>;

    /// Compare-and-set `pending → assigned`.
    ///
    /// Planning inserts subtasks as `pending` and then assigns each one;
    /// a subtask that is past `pending` is left untouched and `false` is
    /// returned.
    async fn assign_subtask(&self, id: Uuid) -> FleetResult<bool>;

    /// Compare-and-set `assigned → in_progress`.
    ///
    /// The dispatch idempotency guard: exactly one caller per subtask
    /// observes `true`; a tick re-matching an already-claimed subtask
    /// gets `false` and must not start a second execution.
    async fn claim_subtask(&self, id: Uuid) -> FleetResult<bool>;

    /// Compare-and-set `in_progress → completed`, persisting the output.
    ///
    /// Returns `false` when the subtask is no longer `in_progress`
    /// (e.g. the task was cancelled underneath an in-flight call).
    async fn complete_subtask(&self, id: Uuid, output: RoleOutput) -> FleetResult<bool>;

    /// Mark a subtask failed unless it already reached a terminal state.
    async fn fail_subtask(&self, id: Uuid) -> FleetResult<bool>;

    /// Count of subtasks of the task not yet `completed`.
    async fn incomplete_count(&self, task_id: Uuid) -> FleetResult<usize>;

    // --- Messages ---

    /// Persist a new undelivered message.
    async fn insert_message(&self, message: AgentMessage) -> FleetResult<()>;

    /// All undelivered messages, oldest first.
    async fn undelivered_messages(&self) -> FleetResult<Vec<AgentMessage>>;

    /// Compare-and-set the delivered flag. At-most-once: exactly one
    /// caller observes `true` per message.
    async fn mark_delivered(&self, id: Uuid) -> FleetResult<bool>;

    /// All messages belonging to a task, oldest first.
    async fn messages_for_task(&self, task_id: Uuid) -> FleetResult<Vec<AgentMessage>>;
}
