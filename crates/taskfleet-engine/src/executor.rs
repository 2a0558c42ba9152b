//! Work dispatch and subtask execution.
//!
//! The dispatch phase matches hub-gated, sequence-ordered subtasks to
//! idle agents and claims them through the store's compare-and-set; the
//! executor runs the reasoning call off-tick and re-enters shared state
//! once to apply its side effects.

use crate::engine::Engine;
use taskfleet_core::model::truncate_chars;
use taskfleet_core::{AgentMessage, FleetResult, RoleOutput, Subtask, SubtaskStatus, TaskStatus};
use taskfleet_events::FleetEvent;
use taskfleet_reason::{clip_words, parse_reply};
use taskfleet_world::AgentEvent;
use tracing::{info, warn};
use uuid::Uuid;

const CELEBRATION_LINES: [&str; 5] = [
    "Nice work, everyone!",
    "That one's done!",
    "Shipped!",
    "Great teamwork!",
    "On to the next!",
];

impl Engine {
    /// Phase 3: claim and launch ready subtasks.
    ///
    /// For each active task only the lowest-sequence non-completed
    /// subtask is considered; it launches only while `assigned`, with
    /// its agent idle at the subtask's hub. The claim compare-and-set
    /// makes a re-run of this phase harmless.
    pub(crate) async fn dispatch_phase(&self) -> FleetResult<()> {
        let active: Vec<Uuid> = self
            .inner
            .active_tasks
            .read()
            .await
            .iter()
            .copied()
            .collect();

        for task_id in active {
            let Some(task) = self.inner.store.get_task(task_id).await? else {
                self.inner.active_tasks.write().await.remove(&task_id);
                continue;
            };
            if task.status.is_terminal() {
                self.inner.active_tasks.write().await.remove(&task_id);
                continue;
            }
            if task.status != TaskStatus::InProgress {
                // Still planning.
                continue;
            }

            let subtasks = self.inner.store.subtasks_for_task(task_id).await?;
            let Some(next) = subtasks
                .iter()
                .find(|s| s.status != SubtaskStatus::Completed)
            else {
                continue;
            };
            if next.status != SubtaskStatus::Assigned {
                continue;
            }

            let ready = {
                let roster = self.inner.roster.read().await;
                roster
                    .get(&next.agent_id)
                    .is_some_and(|agent| agent.is_idle_at(&next.hub))
            };
            if !ready {
                self.nudge_toward(next.agent_id, &next.hub).await;
                continue;
            }

            if !self.inner.store.claim_subtask(next.id).await? {
                continue;
            }
            info!(task_id = %task_id, subtask_id = %next.id, role = %next.role, "subtask dispatched");
            self.publish(FleetEvent::SubtaskStatusChanged {
                task_id,
                subtask_id: next.id,
                role: next.role,
                status: SubtaskStatus::InProgress,
            });
            self.apply_agent(
                next.agent_id,
                AgentEvent::StartWork {
                    subtask_id: next.id,
                    doing: next.description.clone(),
                },
            )
            .await;

            let engine = self.clone();
            let subtask = next.clone();
            tokio::spawn(async move {
                // A claimed subtask must always reach a terminal state;
                // an unexpected error becomes a recorded failure, never
                // a silent strand.
                if let Err(error) = engine.execute_subtask(subtask.clone()).await {
                    warn!(%error, "subtask execution errored");
                    if let Err(error) = engine
                        .fail_subtask_path(&subtask, format!("execution error: {error}"))
                        .await
                    {
                        warn!(%error, "recording the subtask failure also failed");
                    }
                }
            });
        }
        Ok(())
    }

    /// Run one claimed subtask to a terminal state.
    ///
    /// Completion is conditional: a task cancelled while the call was in
    /// flight rejects the store update and the result is discarded.
    pub(crate) async fn execute_subtask(&self, subtask: Subtask) -> FleetResult<()> {
        let persona = self
            .inner
            .profiles
            .get(&subtask.role)
            .map(|p| p.persona.clone())
            .unwrap_or_default();
        let context = match self.build_context(&subtask).await {
            Ok(context) => context,
            Err(error) => {
                return self
                    .fail_subtask_path(&subtask, format!("context build failed: {error}"))
                    .await;
            }
        };

        let text = match tokio::time::timeout(
            self.inner.config.reasoning_timeout(),
            self.inner.backend.complete(&persona, &context),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(error)) => {
                return self
                    .fail_subtask_path(&subtask, format!("reasoning call failed: {error}"))
                    .await;
            }
            Err(_) => {
                return self
                    .fail_subtask_path(&subtask, "reasoning call timed out".into())
                    .await;
            }
        };

        let reply = parse_reply(&text);
        if let Some(thinking) = &reply.thinking {
            self.publish(FleetEvent::AgentThought {
                agent_id: subtask.agent_id,
                text: thinking.clone(),
            });
        }
        if let Some(saying) = &reply.saying {
            let to_agent = match &reply.to_agent {
                Some(name) => self.agent_id_for_role_name(name).await,
                None => None,
            };
            self.publish(FleetEvent::AgentSpoke {
                agent_id: subtask.agent_id,
                to_agent,
                text: clip_words(saying, 15),
            });
        }

        let output = reply
            .output
            .unwrap_or(RoleOutput::Text { content: text });
        // Conditional completion: the subtask must still be in_progress
        // and the task must not have gone terminal underneath the call.
        let task_active = self
            .inner
            .store
            .get_task(subtask.task_id)
            .await?
            .is_some_and(|t| !t.status.is_terminal());
        let completed = task_active
            && self.inner.store.complete_subtask(subtask.id, output).await?;
        if completed {
            self.publish(FleetEvent::SubtaskStatusChanged {
                task_id: subtask.task_id,
                subtask_id: subtask.id,
                role: subtask.role,
                status: SubtaskStatus::Completed,
            });
        } else {
            // Cancelled (or otherwise finished) underneath the call.
            info!(subtask_id = %subtask.id, "late result discarded");
        }

        self.apply_agent(subtask.agent_id, AgentEvent::CompleteWork)
            .await;

        if completed {
            if let Some(helper_role) = &reply.needs_help {
                self.request_help(&subtask, helper_role, reply.help_topic.as_deref())
                    .await?;
            }
            self.completion_check(subtask.task_id).await?;
        }
        Ok(())
    }

    /// Terminal failure of one subtask, which fails its task (fail-fast).
    async fn fail_subtask_path(&self, subtask: &Subtask, error: String) -> FleetResult<()> {
        if self.inner.store.fail_subtask(subtask.id).await? {
            self.publish(FleetEvent::SubtaskStatusChanged {
                task_id: subtask.task_id,
                subtask_id: subtask.id,
                role: subtask.role,
                status: SubtaskStatus::Failed,
            });
        }
        self.apply_agent(subtask.agent_id, AgentEvent::CompleteWork)
            .await;
        self.fail_task(subtask.task_id, error).await
    }

    /// Prompt context: the subtask description prefixed with every
    /// completed lower-sequence output, each clipped to the budget.
    async fn build_context(&self, subtask: &Subtask) -> FleetResult<String> {
        let siblings = self.inner.store.subtasks_for_task(subtask.task_id).await?;
        let mut prior = String::new();
        for sibling in siblings
            .iter()
            .filter(|s| s.sequence < subtask.sequence && s.status == SubtaskStatus::Completed)
        {
            if let Some(output) = &sibling.output {
                prior.push_str(&format!(
                    "## {} (step {})\n{}\n\n",
                    sibling.role,
                    sibling.sequence + 1,
                    truncate_chars(&output.as_text(), self.inner.config.context_budget),
                ));
            }
        }
        if prior.is_empty() {
            Ok(format!("Your step: {}", subtask.description))
        } else {
            Ok(format!("Work so far:\n\n{prior}Your step: {}", subtask.description))
        }
    }

    /// Queue a help exchange at the social hub and start both parties
    /// toward it.
    async fn request_help(
        &self,
        subtask: &Subtask,
        helper_role: &str,
        topic: Option<&str>,
    ) -> FleetResult<()> {
        let Some(helper) = self.agent_id_for_role_name(helper_role).await else {
            warn!(subtask_id = %subtask.id, role = helper_role, "help request for unknown role");
            return Ok(());
        };
        let Some(social) = self.inner.hubs.social_hub() else {
            return Ok(());
        };
        let hub = social.id.clone();
        let content = topic.unwrap_or("I need your input on my current step").to_string();
        let message = AgentMessage::new(subtask.task_id, subtask.agent_id, helper, content, &hub);
        info!(message_id = %message.id, from = %subtask.agent_id, to = %helper, "help requested");
        self.inner.store.insert_message(message).await?;
        self.nudge_toward(subtask.agent_id, &hub).await;
        self.nudge_toward(helper, &hub).await;
        Ok(())
    }

    /// Completion check: all subtasks completed ⇒ task completed,
    /// artifacts attached, fleet recalled for a celebration.
    pub(crate) async fn completion_check(&self, task_id: Uuid) -> FleetResult<()> {
        if self.inner.store.incomplete_count(task_id).await? != 0 {
            return Ok(());
        }
        let Some(task) = self.inner.store.get_task(task_id).await? else {
            return Ok(());
        };
        if task.status.is_terminal() {
            return Ok(());
        }

        let subtasks = self.inner.store.subtasks_for_task(task_id).await?;
        // The work itself succeeded, but a task cannot complete without
        // its artifacts; a packaging error is terminal, not a strand.
        let artifacts = match self.inner.packager.package(&task, &subtasks).await {
            Ok(artifacts) => artifacts,
            Err(error) => {
                return self
                    .fail_task(task_id, format!("artifact packaging failed: {error}"))
                    .await;
            }
        };
        if !artifacts.is_empty() {
            self.inner.store.attach_artifacts(task_id, artifacts).await?;
        }

        if self
            .inner
            .store
            .set_task_status(task_id, TaskStatus::Completed, None)
            .await?
        {
            info!(%task_id, "task completed");
            self.inner.active_tasks.write().await.remove(&task_id);
            self.publish(FleetEvent::TaskStatusChanged {
                task_id,
                status: TaskStatus::Completed,
                error: None,
            });
            self.celebrate().await;
        }
        Ok(())
    }

    /// Recall every idle agent to the social hub and stagger a round of
    /// congratulations on the event bus.
    async fn celebrate(&self) {
        let Some(social) = self.inner.hubs.social_hub() else {
            return;
        };
        let hub = social.id.clone();
        let agent_ids: Vec<Uuid> = {
            let roster = self.inner.roster.read().await;
            roster.keys().copied().collect()
        };
        for agent_id in &agent_ids {
            self.nudge_toward(*agent_id, &hub).await;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            for (index, agent_id) in agent_ids.into_iter().enumerate() {
                tokio::time::sleep(std::time::Duration::from_millis(300 * index as u64)).await;
                engine.publish(FleetEvent::AgentSpoke {
                    agent_id,
                    to_agent: None,
                    text: CELEBRATION_LINES[index % CELEBRATION_LINES.len()].to_string(),
                });
            }
        });
    }
}
