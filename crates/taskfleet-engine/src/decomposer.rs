//! Intake and task decomposition.
//!
//! The intake phase moves pending tasks into planning and fires the
//! planner's reasoning call off-tick; the decomposition persists the plan
//! as a `pending` subtask batch, assigns each step to its agent, or fails
//! the task terminally.

use crate::engine::Engine;
use taskfleet_core::{AgentRole, FleetError, FleetResult, Subtask, SubtaskStatus, Task, TaskStatus};
use taskfleet_events::FleetEvent;
use taskfleet_reason::{parse_plan, PlanStep};
use tracing::{info, warn};
use uuid::Uuid;

impl Engine {
    /// Phase 1: pull a bounded batch of pending tasks into planning.
    pub(crate) async fn intake_phase(&self) -> FleetResult<()> {
        let batch = self
            .inner
            .store
            .pending_tasks(self.inner.config.intake_batch)
            .await?;

        for task in batch {
            // A concurrent cancel can win this race; skip quietly.
            if !self
                .inner
                .store
                .set_task_status(task.id, TaskStatus::Planning, None)
                .await?
            {
                continue;
            }
            info!(task_id = %task.id, "task entering planning");
            self.inner.active_tasks.write().await.insert(task.id);
            self.publish(FleetEvent::TaskStatusChanged {
                task_id: task.id,
                status: TaskStatus::Planning,
                error: None,
            });

            if let Some(planner) = self.agent_id_for_role(AgentRole::Planner).await {
                if let Some(profile) = self.inner.profiles.get(&AgentRole::Planner) {
                    self.nudge_toward(planner, &profile.home_hub).await;
                }
            }

            let engine = self.clone();
            let task_id = task.id;
            tokio::spawn(async move {
                // A task that entered planning must reach in_progress or
                // a terminal state; an unexpected error fails it rather
                // than stranding it.
                if let Err(error) = engine.decompose_task(task).await {
                    warn!(%error, "decomposition errored");
                    if let Err(error) = engine
                        .fail_task(task_id, format!("planning error: {error}"))
                        .await
                    {
                        warn!(%error, "recording the planning failure also failed");
                    }
                }
            });
        }
        Ok(())
    }

    /// Turn the planner's reply into an ordered subtask batch.
    ///
    /// Runs off-tick. Any planning defect — unparsable plan, unknown
    /// role, missing agent — fails the task with a descriptive error and
    /// is not retried.
    pub(crate) async fn decompose_task(&self, task: Task) -> FleetResult<()> {
        let persona = self
            .inner
            .profiles
            .get(&AgentRole::Planner)
            .map(|p| p.persona.clone())
            .unwrap_or_default();
        let prompt = crate::profiles::plan_prompt(&task.prompt);

        let reply = match tokio::time::timeout(
            self.inner.config.reasoning_timeout(),
            self.inner.backend.complete(&persona, &prompt),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                return self.fail_task(task.id, format!("planning call failed: {error}")).await;
            }
            Err(_) => {
                return self.fail_task(task.id, "planning call timed out".into()).await;
            }
        };

        let steps = match parse_plan(&reply) {
            Ok(steps) => steps,
            Err(error) => {
                return self.fail_task(task.id, format!("unusable plan: {error}")).await;
            }
        };

        let subtasks = match self.resolve_plan(task.id, &steps).await {
            Ok(subtasks) => subtasks,
            Err(error) => {
                return self.fail_task(task.id, error.to_string()).await;
            }
        };

        self.inner.store.insert_subtasks(subtasks.clone()).await?;

        // A cancel that landed during the call wins here; the plan is
        // simply never dispatched.
        if !self
            .inner
            .store
            .set_task_status(task.id, TaskStatus::InProgress, None)
            .await?
        {
            return Ok(());
        }
        info!(task_id = %task.id, steps = subtasks.len(), "plan accepted");
        self.publish(FleetEvent::TaskStatusChanged {
            task_id: task.id,
            status: TaskStatus::InProgress,
            error: None,
        });
        for subtask in &subtasks {
            self.publish(FleetEvent::SubtaskStatusChanged {
                task_id: task.id,
                subtask_id: subtask.id,
                role: subtask.role,
                status: SubtaskStatus::Pending,
            });
            // Each step is handed to its agent through the store, so a
            // restarted engine sees assignments, not bare plan rows.
            if self.inner.store.assign_subtask(subtask.id).await? {
                self.publish(FleetEvent::SubtaskStatusChanged {
                    task_id: task.id,
                    subtask_id: subtask.id,
                    role: subtask.role,
                    status: SubtaskStatus::Assigned,
                });
                self.nudge_toward(subtask.agent_id, &subtask.hub).await;
            }
        }
        Ok(())
    }

    /// Resolve plan steps to concrete agents and home hubs.
    async fn resolve_plan(&self, task_id: Uuid, steps: &[PlanStep]) -> FleetResult<Vec<Subtask>> {
        let mut subtasks = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let role = AgentRole::parse(&step.role)
                .ok_or_else(|| FleetError::Engine(format!("plan names unknown role '{}'", step.role)))?;
            let agent_id = self
                .agent_id_for_role(role)
                .await
                .ok_or_else(|| FleetError::Engine(format!("no agent for role '{role}'")))?;
            let profile = self
                .inner
                .profiles
                .get(&role)
                .ok_or_else(|| FleetError::Engine(format!("no profile for role '{role}'")))?;

            subtasks.push(Subtask::new(
                task_id,
                agent_id,
                role,
                step.description.clone(),
                profile.home_hub.clone(),
                index as u32,
            ));
        }
        Ok(subtasks)
    }
}
