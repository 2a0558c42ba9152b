use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a worker agent in the fleet.
///
/// The set is fixed at compile time but adding a variant only requires a
/// persona and a home hub in the engine profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Decomposes submitted tasks into an ordered subtask plan.
    Planner,
    /// Produces design specifications.
    Designer,
    /// Produces code from designs.
    Coder,
    /// Writes and runs tests.
    Tester,
    /// Reviews the work of the others.
    Reviewer,
}

impl AgentRole {
    /// All roles, in planning order.
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Planner,
        AgentRole::Designer,
        AgentRole::Coder,
        AgentRole::Tester,
        AgentRole::Reviewer,
    ];

    /// Parse a role from its lowercase wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "planner" => Some(AgentRole::Planner),
            "designer" => Some(AgentRole::Designer),
            "coder" => Some(AgentRole::Coder),
            "tester" => Some(AgentRole::Tester),
            "reviewer" => Some(AgentRole::Reviewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Planner => write!(f, "planner"),
            AgentRole::Designer => write!(f, "designer"),
            AgentRole::Coder => write!(f, "coder"),
            AgentRole::Tester => write!(f, "tester"),
            AgentRole::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Lifecycle status of a submitted task.
///
/// `Completed`, `Failed`, and `Cancelled` are terminal — no further
/// mutation is applied to a task once it reaches one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, waiting for intake.
    Pending,
    /// Picked up by intake; a plan is being produced.
    Planning,
    /// Plan accepted; subtasks are executing.
    InProgress,
    /// All subtasks completed and artifacts attached.
    Completed,
    /// Terminally failed; see [`Task::error`].
    Failed,
    /// Withdrawn by the submitter.
    Cancelled,
}

impl TaskStatus {
    /// True for `Completed`, `Failed`, and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A user-submitted task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: Uuid,
    /// The prompt as submitted by the user.
    pub prompt: String,
    /// Optional identifier of the submitter.
    pub submitted_by: Option<String>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Human-readable failure detail. `None` unless status is `Failed`.
    pub error: Option<String>,
    /// Opaque artifact references attached on completion.
    pub artifacts: Vec<Artifact>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Time of the last status change.
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the task reaches `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// New pending task with a fresh id.
    pub fn new(prompt: impl Into<String>, submitted_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            submitted_by,
            status: TaskStatus::Pending,
            error: None,
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Lifecycle status of a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    /// Planned but not yet handed to its agent.
    Pending,
    /// Handed to its agent, waiting for dispatch.
    Assigned,
    /// Claimed by dispatch; a reasoning call is in flight.
    InProgress,
    /// Finished with an output recorded.
    Completed,
    /// Terminally failed.
    Failed,
}

/// One ordered unit of work within a task, bound to one agent role.
///
/// `sequence` is dense and zero-based per task; a subtask may only execute
/// once every lower-sequence subtask of the same task is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique subtask identifier.
    pub id: Uuid,
    /// Task this subtask belongs to.
    pub task_id: Uuid,
    /// The concrete agent this subtask was resolved to.
    pub agent_id: Uuid,
    /// Role the work calls for.
    pub role: AgentRole,
    /// What the agent is asked to do.
    pub description: String,
    /// Hub where the work must happen; gates dispatch.
    pub hub: String,
    /// Zero-based position within the task's plan.
    pub sequence: u32,
    /// Current lifecycle status.
    pub status: SubtaskStatus,
    /// Result, recorded on completion.
    pub output: Option<RoleOutput>,
    /// Planning time.
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    /// New pending subtask with a fresh id.
    pub fn new(
        task_id: Uuid,
        agent_id: Uuid,
        role: AgentRole,
        description: impl Into<String>,
        hub: impl Into<String>,
        sequence: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            agent_id,
            role,
            description: description.into(),
            hub: hub.into(),
            sequence,
            status: SubtaskStatus::Pending,
            output: None,
            created_at: Utc::now(),
        }
    }
}

/// Role-specific result of a subtask, with a raw-text fallback for replies
/// that did not carry a well-formed structured block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleOutput {
    /// A design specification.
    Design {
        /// The specification text.
        spec: String,
    },
    /// Produced code, keyed by file path.
    Code {
        /// The produced files.
        files: Vec<CodeFile>,
    },
    /// A review verdict with optional notes.
    Review {
        /// Short verdict, e.g. "approved".
        verdict: String,
        /// Free-form reviewer notes.
        notes: Option<String>,
    },
    /// Unstructured output (graceful degradation of an unparsable reply).
    Text {
        /// The raw reply text.
        content: String,
    },
}

impl RoleOutput {
    /// Flatten the output to text for display and context building.
    pub fn as_text(&self) -> String {
        match self {
            RoleOutput::Design { spec } => spec.clone(),
            RoleOutput::Code { files } => files
                .iter()
                .map(|f| format!("// {}\n{}", f.path, f.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
            RoleOutput::Review { verdict, notes } => match notes {
                Some(n) => format!("{verdict}: {n}"),
                None => verdict.clone(),
            },
            RoleOutput::Text { content } => content.clone(),
        }
    }
}

/// A single produced file within a [`RoleOutput::Code`] payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFile {
    /// Relative path of the file.
    pub path: String,
    /// File contents.
    pub content: String,
}

/// A message from one agent to another, delivered only when both occupy
/// the message's hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message identifier.
    pub id: Uuid,
    /// Task the exchange belongs to.
    pub task_id: Uuid,
    /// Sender.
    pub from_agent: Uuid,
    /// Recipient.
    pub to_agent: Uuid,
    /// Message text.
    pub content: String,
    /// Hub where the exchange must happen.
    pub hub: String,
    /// Set exactly once when both agents met at the hub.
    pub delivered: bool,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    /// New undelivered message with a fresh id.
    pub fn new(
        task_id: Uuid,
        from_agent: Uuid,
        to_agent: Uuid,
        content: impl Into<String>,
        hub: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            from_agent,
            to_agent,
            content: content.into(),
            hub: hub.into(),
            delivered: false,
            created_at: Utc::now(),
        }
    }
}

/// An opaque artifact reference produced by the packaging collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Display name.
    pub label: String,
    /// Download or preview locator. The engine does not interpret it.
    pub locator: String,
    /// Packaging time.
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// New artifact reference stamped with the current time.
    pub fn new(label: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            locator: locator.into(),
            created_at: Utc::now(),
        }
    }
}

/// Truncate a string to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
