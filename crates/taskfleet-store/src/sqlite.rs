use crate::TaskStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use taskfleet_core::{
    AgentMessage, AgentRole, Artifact, FleetError, FleetResult, RoleOutput, Subtask,
    SubtaskStatus, Task, TaskStatus,
};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id            TEXT PRIMARY KEY,
    prompt        TEXT NOT NULL,
    submitted_by  TEXT,
    status        TEXT NOT NULL,
    error         TEXT,
    artifacts     TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    completed_at  TEXT
);
CREATE TABLE IF NOT EXISTS subtasks (
    id           TEXT PRIMARY KEY,
    task_id      TEXT NOT NULL,
    agent_id     TEXT NOT NULL,
    role         TEXT NOT NULL,
    description  TEXT NOT NULL,
    hub          TEXT NOT NULL,
    sequence     INTEGER NOT NULL,
    status       TEXT NOT NULL,
    output       TEXT,
    created_at   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY,
    task_id     TEXT NOT NULL,
    from_agent  TEXT NOT NULL,
    to_agent    TEXT NOT NULL,
    content     TEXT NOT NULL,
    hub         TEXT NOT NULL,
    delivered   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks (task_id, sequence);
CREATE INDEX IF NOT EXISTS idx_messages_undelivered ON messages (delivered, created_at);
";

/// SQLite-backed [`TaskStore`].
///
/// The connection sits behind a mutex; each trait method is one short
/// transaction, so the compare-and-set mutations stay atomic.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> FleetResult<Self> {
        Self::from_connection(
            Connection::open(path).map_err(|e| FleetError::Store(e.to_string()))?,
        )
    }

    /// Open an in-memory store (used by tests).
    pub fn open_in_memory() -> FleetResult<Self> {
        Self::from_connection(
            Connection::open_in_memory().map_err(|e| FleetError::Store(e.to_string()))?,
        )
    }

    fn from_connection(conn: Connection) -> FleetResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| FleetError::Store(format!("schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn store_err(e: rusqlite::Error) -> FleetError {
    FleetError::Store(e.to_string())
}

fn task_status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Planning => "planning",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

fn parse_task_status(s: &str) -> FleetResult<TaskStatus> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "planning" => Ok(TaskStatus::Planning),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" => Ok(TaskStatus::Completed),
        "failed" => Ok(TaskStatus::Failed),
        "cancelled" => Ok(TaskStatus::Cancelled),
        other => Err(FleetError::Store(format!("unknown task status '{other}'"))),
    }
}

fn subtask_status_str(status: SubtaskStatus) -> &'static str {
    match status {
        SubtaskStatus::Pending => "pending",
        SubtaskStatus::Assigned => "assigned",
        SubtaskStatus::InProgress => "in_progress",
        SubtaskStatus::Completed => "completed",
        SubtaskStatus::Failed => "failed",
    }
}

fn parse_subtask_status(s: &str) -> FleetResult<SubtaskStatus> {
    match s {
        "pending" => Ok(SubtaskStatus::Pending),
        "assigned" => Ok(SubtaskStatus::Assigned),
        "in_progress" => Ok(SubtaskStatus::InProgress),
        "completed" => Ok(SubtaskStatus::Completed),
        "failed" => Ok(SubtaskStatus::Failed),
        other => Err(FleetError::Store(format!(
            "unknown subtask status '{other}'"
        ))),
    }
}

fn parse_uuid(s: &str) -> FleetResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| FleetError::Store(format!("bad uuid '{s}': {e}")))
}

fn parse_time(s: &str) -> FleetResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| FleetError::Store(format!("bad timestamp '{s}': {e}")))
}

/// Raw column tuples read inside rusqlite closures, converted to domain
/// records outside so JSON/uuid errors map to [`FleetError::Store`].
type TaskRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
);

type SubtaskRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    String,
);

type MessageRow = (String, String, String, String, String, String, bool, String);

const TASK_COLUMNS: &str =
    "id, prompt, submitted_by, status, error, artifacts, created_at, updated_at, completed_at";

const SUBTASK_COLUMNS: &str =
    "id, task_id, agent_id, role, description, hub, sequence, status, output, created_at";

const MESSAGE_COLUMNS: &str =
    "id, task_id, from_agent, to_agent, content, hub, delivered, created_at";

fn read_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn task_from_row(row: TaskRow) -> FleetResult<Task> {
    let (id, prompt, submitted_by, status, error, artifacts, created_at, updated_at, completed_at) =
        row;
    Ok(Task {
        id: parse_uuid(&id)?,
        prompt,
        submitted_by,
        status: parse_task_status(&status)?,
        error,
        artifacts: serde_json::from_str::<Vec<Artifact>>(&artifacts)?,
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
        completed_at: completed_at.as_deref().map(parse_time).transpose()?,
    })
}

fn read_subtask_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubtaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn subtask_from_row(row: SubtaskRow) -> FleetResult<Subtask> {
    let (id, task_id, agent_id, role, description, hub, sequence, status, output, created_at) = row;
    Ok(Subtask {
        id: parse_uuid(&id)?,
        task_id: parse_uuid(&task_id)?,
        agent_id: parse_uuid(&agent_id)?,
        role: AgentRole::parse(&role)
            .ok_or_else(|| FleetError::Store(format!("unknown role '{role}'")))?,
        description,
        hub,
        sequence: u32::try_from(sequence)
            .map_err(|_| FleetError::Store(format!("bad sequence {sequence}")))?,
        status: parse_subtask_status(&status)?,
        output: output
            .as_deref()
            .map(serde_json::from_str::<RoleOutput>)
            .transpose()?,
        created_at: parse_time(&created_at)?,
    })
}

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn message_from_row(row: MessageRow) -> FleetResult<AgentMessage> {
    let (id, task_id, from_agent, to_agent, content, hub, delivered, created_at) = row;
    Ok(AgentMessage {
        id: parse_uuid(&id)?,
        task_id: parse_uuid(&task_id)?,
        from_agent: parse_uuid(&from_agent)?,
        to_agent: parse_uuid(&to_agent)?,
        content,
        hub,
        delivered,
        created_at: parse_time(&created_at)?,
    })
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert_task(&self, task: Task) -> FleetResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO tasks (id, prompt, submitted_by, status, error, artifacts, \
             created_at, updated_at, completed_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                task.id.to_string(),
                task.prompt,
                task.submitted_by,
                task_status_str(task.status),
                task.error,
                serde_json::to_string(&task.artifacts)?,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
                task.completed_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> FleetResult<Option<Task>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
                read_task_row,
            )
            .optional()
            .map_err(store_err)?;
        row.map(task_from_row).transpose()
    }

    async fn pending_tasks(&self, limit: usize) -> FleetResult<Vec<Task>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'pending' \
                 ORDER BY created_at ASC LIMIT ?1"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], read_task_row)
            .map_err(store_err)?
            .collect::<Result<Vec<TaskRow>, _>>()
            .map_err(store_err)?;
        rows.into_iter().map(task_from_row).collect()
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: Option<String>,
    ) -> FleetResult<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE tasks SET status = ?1, error = ?2, updated_at = ?3, \
                 completed_at = CASE WHEN ?1 = 'completed' THEN ?3 ELSE completed_at END \
                 WHERE id = ?4 AND status NOT IN ('completed','failed','cancelled')",
                params![task_status_str(status), error, now, id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn attach_artifacts(&self, id: Uuid, artifacts: Vec<Artifact>) -> FleetResult<()> {
        let conn = self.conn.lock();
        let existing: String = conn
            .query_row(
                "SELECT artifacts FROM tasks WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|_| FleetError::Store(format!("unknown task {id}")))?;
        let mut all: Vec<Artifact> = serde_json::from_str(&existing)?;
        all.extend(artifacts);
        conn.execute(
            "UPDATE tasks SET artifacts = ?1 WHERE id = ?2",
            params![serde_json::to_string(&all)?, id.to_string()],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn insert_subtasks(&self, subtasks: Vec<Subtask>) -> FleetResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(store_err)?;
        for subtask in subtasks {
            tx.execute(
                "INSERT OR REPLACE INTO subtasks (id, task_id, agent_id, role, description, \
                 hub, sequence, status, output, created_at) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    subtask.id.to_string(),
                    subtask.task_id.to_string(),
                    subtask.agent_id.to_string(),
                    subtask.role.to_string(),
                    subtask.description,
                    subtask.hub,
                    i64::from(subtask.sequence),
                    subtask_status_str(subtask.status),
                    subtask
                        .output
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    subtask.created_at.to_rfc3339(),
                ],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    async fn get_subtask(&self, id: Uuid) -> FleetResult<Option<Subtask>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE id = ?1"),
                params![id.to_string()],
                read_subtask_row,
            )
            .optional()
            .map_err(store_err)?;
        row.map(subtask_from_row).transpose()
    }

    async fn subtasks_for_task(&self, task_id: Uuid) -> FleetResult<Vec<Subtask>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SUBTASK_COLUMNS} FROM subtasks WHERE task_id = ?1 ORDER BY sequence ASC"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![task_id.to_string()], read_subtask_row)
            .map_err(store_err)?
            .collect::<Result<Vec<SubtaskRow>, _>>()
            .map_err(store_err)?;
        rows.into_iter().map(subtask_from_row).collect()
    }

    async fn assign_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE subtasks SET status = 'assigned' \
                 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn claim_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE subtasks SET status = 'in_progress' \
                 WHERE id = ?1 AND status = 'assigned'",
                params![id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn complete_subtask(&self, id: Uuid, output: RoleOutput) -> FleetResult<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE subtasks SET status = 'completed', output = ?1 \
                 WHERE id = ?2 AND status = 'in_progress'",
                params![serde_json::to_string(&output)?, id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn fail_subtask(&self, id: Uuid) -> FleetResult<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE subtasks SET status = 'failed' \
                 WHERE id = ?1 AND status NOT IN ('completed','failed')",
                params![id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn incomplete_count(&self, task_id: Uuid) -> FleetResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subtasks WHERE task_id = ?1 AND status != 'completed'",
                params![task_id.to_string()],
                |row| row.get(0),
            )
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn insert_message(&self, message: AgentMessage) -> FleetResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO messages (id, task_id, from_agent, to_agent, content, \
             hub, delivered, created_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                message.id.to_string(),
                message.task_id.to_string(),
                message.from_agent.to_string(),
                message.to_agent.to_string(),
                message.content,
                message.hub,
                message.delivered,
                message.created_at.to_rfc3339(),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn undelivered_messages(&self) -> FleetResult<Vec<AgentMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE delivered = 0 \
                 ORDER BY created_at ASC"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], read_message_row)
            .map_err(store_err)?
            .collect::<Result<Vec<MessageRow>, _>>()
            .map_err(store_err)?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn mark_delivered(&self, id: Uuid) -> FleetResult<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE messages SET delivered = 1 WHERE id = ?1 AND delivered = 0",
                params![id.to_string()],
            )
            .map_err(store_err)?;
        Ok(changed == 1)
    }

    async fn messages_for_task(&self, task_id: Uuid) -> FleetResult<Vec<AgentMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE task_id = ?1 \
                 ORDER BY created_at ASC"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![task_id.to_string()], read_message_row)
            .map_err(store_err)?
            .collect::<Result<Vec<MessageRow>, _>>()
            .map_err(store_err)?;
        rows.into_iter().map(message_from_row).collect()
    }
}
