use crate::config::EngineConfig;
use crate::packager::ArtifactPackager;
use crate::profiles::RoleProfile;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use taskfleet_core::{
    AgentMessage, AgentRole, FleetError, FleetResult, Subtask, Task, TaskStatus,
};
use taskfleet_events::{EventBus, FleetEvent};
use taskfleet_reason::ReasoningBackend;
use taskfleet_store::TaskStore;
use taskfleet_world::{Agent, AgentEvent, AgentStatus, HubRegistry, Movement};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything the gateway reports about one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    /// The task itself.
    pub task: Task,
    /// Its subtasks, ordered by sequence.
    pub subtasks: Vec<Subtask>,
    /// Its inter-agent messages, oldest first.
    pub messages: Vec<AgentMessage>,
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) hubs: HubRegistry,
    pub(crate) movement: Movement,
    pub(crate) profiles: HashMap<AgentRole, RoleProfile>,
    pub(crate) roster: RwLock<HashMap<Uuid, Agent>>,
    /// Tasks between intake and a terminal status; the dispatch and
    /// completion paths poll only these.
    pub(crate) active_tasks: RwLock<HashSet<Uuid>>,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) backend: Arc<dyn ReasoningBackend>,
    pub(crate) packager: Arc<dyn ArtifactPackager>,
    pub(crate) bus: EventBus,
}

/// The tick-driven orchestrator.
///
/// Owns the agent roster and the set of active tasks; everything else is
/// reached through the store, backend, and packager trait objects, so
/// several independent engines can coexist in one process.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

impl Engine {
    /// Assemble an engine and bootstrap its roster at the social hub.
    ///
    /// Fails when the hub registry lacks a social hub or a profile names
    /// an unknown home hub.
    pub fn new(
        config: EngineConfig,
        hubs: HubRegistry,
        profiles: HashMap<AgentRole, RoleProfile>,
        store: Arc<dyn TaskStore>,
        backend: Arc<dyn ReasoningBackend>,
        packager: Arc<dyn ArtifactPackager>,
    ) -> FleetResult<Self> {
        let social = hubs
            .social_hub()
            .ok_or_else(|| FleetError::Engine("hub registry has no social hub".into()))?;

        // Bootstrap one agent per profiled role, gathered at the social
        // hub; agents are never destroyed afterwards.
        let mut roster = HashMap::new();
        for profile in profiles.values() {
            hubs.require(&profile.home_hub)?;
            let mut agent = Agent::new(
                Uuid::new_v4(),
                profile.agent_name.clone(),
                profile.role,
                social.position,
            );
            agent.current_hub = Some(social.id.clone());
            roster.insert(agent.id, agent);
        }

        let movement = Movement::new(config.speed);
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                hubs,
                movement,
                profiles,
                roster: RwLock::new(roster),
                active_tasks: RwLock::new(HashSet::new()),
                store,
                backend,
                packager,
                bus: EventBus::default(),
            }),
        })
    }

    /// Engine over the default seeded office and role profiles.
    pub fn with_defaults(
        config: EngineConfig,
        store: Arc<dyn TaskStore>,
        backend: Arc<dyn ReasoningBackend>,
        packager: Arc<dyn ArtifactPackager>,
    ) -> FleetResult<Self> {
        Self::new(
            config,
            HubRegistry::seed(),
            crate::profiles::default_profiles(),
            store,
            backend,
            packager,
        )
    }

    /// New receiver on the engine's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.inner.bus.subscribe()
    }

    /// Persist a new task and queue it for the next intake phase.
    pub async fn submit_task(
        &self,
        prompt: String,
        submitted_by: Option<String>,
    ) -> FleetResult<Task> {
        let task = Task::new(prompt, submitted_by);
        self.inner.store.insert_task(task.clone()).await?;
        info!(task_id = %task.id, "task submitted");
        self.publish(FleetEvent::TaskStatusChanged {
            task_id: task.id,
            status: TaskStatus::Pending,
            error: None,
        });
        Ok(task)
    }

    /// Cancel a task.
    ///
    /// Legal from any non-terminal status and an idempotent no-op on
    /// terminal ones. In-flight reasoning calls are not aborted; their
    /// results are discarded when they try to complete against a task
    /// that is no longer active. Returns `None` for an unknown id.
    pub async fn cancel_task(&self, id: Uuid) -> FleetResult<Option<Task>> {
        let Some(task) = self.inner.store.get_task(id).await? else {
            return Ok(None);
        };
        if task.status.is_terminal() {
            return Ok(Some(task));
        }
        if self
            .inner
            .store
            .set_task_status(id, TaskStatus::Cancelled, None)
            .await?
        {
            info!(task_id = %id, "task cancelled");
            self.inner.active_tasks.write().await.remove(&id);
            self.publish(FleetEvent::TaskStatusChanged {
                task_id: id,
                status: TaskStatus::Cancelled,
                error: None,
            });
        }
        self.inner.store.get_task(id).await
    }

    /// Task plus its subtasks and messages, for the gateway.
    pub async fn task_snapshot(&self, id: Uuid) -> FleetResult<Option<TaskSnapshot>> {
        let Some(task) = self.inner.store.get_task(id).await? else {
            return Ok(None);
        };
        Ok(Some(TaskSnapshot {
            subtasks: self.inner.store.subtasks_for_task(id).await?,
            messages: self.inner.store.messages_for_task(id).await?,
            task,
        }))
    }

    /// Current roster, ordered by name for stable output.
    pub async fn agents(&self) -> Vec<Agent> {
        let roster = self.inner.roster.read().await;
        let mut agents: Vec<Agent> = roster.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// Drive the tick scheduler until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.inner.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_ms = self.inner.config.tick_interval_ms,
            agents = self.inner.profiles.len(),
            "engine running"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("engine stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One scheduler round: intake, movement, dispatch, delivery.
    ///
    /// Phases run in order; a failing phase is logged and never blocks
    /// the remaining phases or the next tick.
    pub async fn tick(&self) {
        if let Err(error) = self.intake_phase().await {
            warn!(%error, "intake phase failed");
        }
        if let Err(error) = self.movement_phase().await {
            warn!(%error, "movement phase failed");
        }
        if let Err(error) = self.dispatch_phase().await {
            warn!(%error, "dispatch phase failed");
        }
        if let Err(error) = self.delivery_phase().await {
            warn!(%error, "delivery phase failed");
        }
    }

    /// Advance every traveling agent one step.
    async fn movement_phase(&self) -> FleetResult<()> {
        let mut roster = self.inner.roster.write().await;
        for agent in roster.values_mut() {
            if agent.status != AgentStatus::Traveling {
                continue;
            }
            match self.inner.movement.advance(agent, &self.inner.hubs) {
                Ok(Some(hub)) => {
                    self.publish(FleetEvent::AgentArrived {
                        agent_id: agent.id,
                        hub,
                    });
                    self.publish(FleetEvent::AgentStatusChanged {
                        agent_id: agent.id,
                        status: agent.status.to_string(),
                        doing: agent.doing.clone(),
                    });
                }
                Ok(None) => {
                    self.publish(FleetEvent::AgentMoved {
                        agent_id: agent.id,
                        x: agent.position.x,
                        y: agent.position.y,
                    });
                }
                Err(error) => {
                    warn!(agent_id = %agent.id, %error, "movement failed");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn publish(&self, event: FleetEvent) {
        self.inner.bus.publish(event);
    }

    /// Apply a transition to a roster agent, logging (not propagating)
    /// illegal transitions. Publishes a status event when it sticks.
    pub(crate) async fn apply_agent(&self, agent_id: Uuid, event: AgentEvent) -> bool {
        let mut roster = self.inner.roster.write().await;
        let Some(agent) = roster.get_mut(&agent_id) else {
            warn!(%agent_id, "transition for unknown agent");
            return false;
        };
        if agent.apply_or_log(event) {
            self.publish(FleetEvent::AgentStatusChanged {
                agent_id: agent.id,
                status: agent.status.to_string(),
                doing: agent.doing.clone(),
            });
            true
        } else {
            false
        }
    }

    /// Send an idle agent traveling toward a hub. No-op if it is already
    /// there, already underway, or currently busy.
    pub(crate) async fn nudge_toward(&self, agent_id: Uuid, hub: &str) {
        let needs_travel = {
            let roster = self.inner.roster.read().await;
            match roster.get(&agent_id) {
                Some(agent) => {
                    agent.status == AgentStatus::Idle && agent.current_hub.as_deref() != Some(hub)
                }
                None => false,
            }
        };
        if needs_travel {
            self.apply_agent(agent_id, AgentEvent::StartTravel { hub: hub.to_string() })
                .await;
        }
    }

    pub(crate) async fn agent_id_for_role(&self, role: AgentRole) -> Option<Uuid> {
        let roster = self.inner.roster.read().await;
        roster.values().find(|a| a.role == role).map(|a| a.id)
    }

    /// Resolve a role name from a reply envelope to a roster agent.
    pub(crate) async fn agent_id_for_role_name(&self, name: &str) -> Option<Uuid> {
        let role = AgentRole::parse(name)?;
        self.agent_id_for_role(role).await
    }

    /// Fail a task with a descriptive error and stop dispatching it.
    pub(crate) async fn fail_task(&self, task_id: Uuid, error: String) -> FleetResult<()> {
        if self
            .inner
            .store
            .set_task_status(task_id, TaskStatus::Failed, Some(error.clone()))
            .await?
        {
            warn!(%task_id, %error, "task failed");
            self.inner.active_tasks.write().await.remove(&task_id);
            self.publish(FleetEvent::TaskStatusChanged {
                task_id,
                status: TaskStatus::Failed,
                error: Some(error),
            });
        }
        Ok(())
    }
}
