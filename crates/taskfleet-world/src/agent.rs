use crate::movement::Position;
use serde::{Deserialize, Serialize};
use taskfleet_core::model::truncate_chars;
use taskfleet_core::{AgentRole, FleetError, FleetResult};
use uuid::Uuid;

/// Maximum length of the human-readable "doing" label.
pub const DOING_LABEL_MAX: usize = 50;

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Settled and available for work.
    Idle,
    /// Moving between hubs.
    Traveling,
    /// Executing a subtask.
    Working,
    /// In a face-to-face exchange.
    Chatting,
    /// Parked mid-work on another agent's input.
    Waiting,
    /// Stopped on an external impediment.
    Blocked,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Traveling => "traveling",
            AgentStatus::Working => "working",
            AgentStatus::Chatting => "chatting",
            AgentStatus::Waiting => "waiting",
            AgentStatus::Blocked => "blocked",
        };
        write!(f, "{s}")
    }
}

/// A transition event fired at an agent by the engine.
///
/// The state machine only validates and applies; it never decides when a
/// transition should fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Begin traveling toward a hub. Clears the current hub.
    StartTravel {
        /// Target hub id.
        hub: String,
    },
    /// Reach the current target hub. Clears the target, sets the hub.
    Arrive,
    /// Begin executing a subtask at the current hub.
    StartWork {
        /// The subtask being started.
        subtask_id: Uuid,
        /// Action label, truncated to [`DOING_LABEL_MAX`].
        doing: String,
    },
    /// Finish the current subtask.
    CompleteWork,
    /// Enter a face-to-face exchange with another agent.
    RequestChat,
    /// Leave the exchange.
    EndChat,
    /// Park mid-work waiting on another agent's input.
    Wait,
    /// Stop on an external impediment.
    Block,
    /// Resume work after waiting or being blocked.
    Unblock,
}

impl AgentEvent {
    fn name(&self) -> &'static str {
        match self {
            AgentEvent::StartTravel { .. } => "start_travel",
            AgentEvent::Arrive => "arrive",
            AgentEvent::StartWork { .. } => "start_work",
            AgentEvent::CompleteWork => "complete_work",
            AgentEvent::RequestChat => "request_chat",
            AgentEvent::EndChat => "end_chat",
            AgentEvent::Wait => "wait",
            AgentEvent::Block => "block",
            AgentEvent::Unblock => "unblock",
        }
    }
}

/// One worker agent. Created at bootstrap and never destroyed.
///
/// Status and the hub fields stay mutually consistent because every
/// transition updates its associated fields atomically with the status:
/// a traveling agent always has a target and no current hub; a settled
/// agent the reverse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Role the agent works as.
    pub role: AgentRole,
    /// Continuous office position.
    pub position: Position,
    /// Hub currently occupied; `None` while traveling.
    pub current_hub: Option<String>,
    /// Hub being traveled to; `None` unless traveling.
    pub target_hub: Option<String>,
    /// Current state-machine status.
    pub status: AgentStatus,
    /// Short human-readable action label, capped at [`DOING_LABEL_MAX`].
    pub doing: String,
    /// Subtask being worked on, while `Working`.
    pub current_subtask: Option<Uuid>,
}

impl Agent {
    /// New idle agent at the given position, not at any hub.
    pub fn new(id: Uuid, name: impl Into<String>, role: AgentRole, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            position,
            current_hub: None,
            target_hub: None,
            status: AgentStatus::Idle,
            doing: String::new(),
            current_subtask: None,
        }
    }

    /// Validate and apply a transition.
    ///
    /// Only the transitions in the lifecycle table are legal. An illegal
    /// one returns [`FleetError::IllegalTransition`] and leaves every
    /// field unchanged.
    pub fn apply(&mut self, event: AgentEvent) -> FleetResult<()> {
        use AgentStatus::*;
        match (self.status, &event) {
            (Idle, AgentEvent::StartTravel { hub }) => {
                self.target_hub = Some(hub.clone());
                self.current_hub = None;
                self.status = Traveling;
            }
            (Traveling, AgentEvent::Arrive) => {
                let target = self.target_hub.take().ok_or_else(|| {
                    FleetError::World(format!("agent {} arrived without a target hub", self.name))
                })?;
                self.current_hub = Some(target);
                self.status = Idle;
            }
            (Idle, AgentEvent::StartWork { subtask_id, doing }) => {
                self.current_subtask = Some(*subtask_id);
                self.doing = truncate_chars(doing, DOING_LABEL_MAX);
                self.status = Working;
            }
            (Working, AgentEvent::CompleteWork) => {
                self.current_subtask = None;
                self.doing.clear();
                self.status = Idle;
            }
            (Idle | Working, AgentEvent::RequestChat) => {
                self.status = Chatting;
            }
            (Chatting, AgentEvent::EndChat) => {
                self.doing.clear();
                self.status = Idle;
            }
            (Working, AgentEvent::Wait) => {
                self.status = Waiting;
            }
            (Working, AgentEvent::Block) => {
                self.status = Blocked;
            }
            (Waiting | Blocked, AgentEvent::Unblock) => {
                self.status = Working;
            }
            _ => {
                return Err(FleetError::IllegalTransition {
                    agent: self.name.clone(),
                    event: event.name().to_string(),
                    status: self.status.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply a transition, logging and swallowing an illegal one.
    ///
    /// Used where the engine fires best-effort transitions (e.g. nudging
    /// a busy agent toward a hub) and the table is the arbiter.
    pub fn apply_or_log(&mut self, event: AgentEvent) -> bool {
        match self.apply(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(agent = %self.name, error = %e, "transition rejected");
                false
            }
        }
    }

    /// True when the agent is idle at the given hub — the dispatch
    /// precondition for subtask execution.
    pub fn is_idle_at(&self, hub: &str) -> bool {
        self.status == AgentStatus::Idle && self.current_hub.as_deref() == Some(hub)
    }

    /// True when the agent occupies the hub and is not traveling — the
    /// co-location half of message readiness.
    pub fn is_settled_at(&self, hub: &str) -> bool {
        self.status != AgentStatus::Traveling && self.current_hub.as_deref() == Some(hub)
    }
}
