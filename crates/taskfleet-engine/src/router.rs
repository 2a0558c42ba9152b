//! Co-location-gated message delivery.
//!
//! Messages flow only when sender and recipient both occupy the
//! message's hub; delivery is at-most-once through the store's
//! compare-and-set, and the face-to-face exchange is fire-and-forget.

use crate::engine::Engine;
use taskfleet_core::{AgentMessage, FleetResult};
use taskfleet_events::FleetEvent;
use taskfleet_reason::{clip_words, parse_reply};
use taskfleet_world::AgentEvent;
use tracing::{info, warn};

impl Engine {
    /// Phase 4: deliver every ready message and start the exchanges.
    ///
    /// Readiness is re-evaluated from scratch every tick; participants
    /// still idling elsewhere are nudged toward the hub instead.
    pub(crate) async fn delivery_phase(&self) -> FleetResult<()> {
        let pending = self.inner.store.undelivered_messages().await?;
        for message in pending {
            let ready = {
                let roster = self.inner.roster.read().await;
                let sender_there = roster
                    .get(&message.from_agent)
                    .is_some_and(|a| a.is_settled_at(&message.hub));
                let recipient_there = roster
                    .get(&message.to_agent)
                    .is_some_and(|a| a.is_settled_at(&message.hub));
                sender_there && recipient_there
            };
            if !ready {
                self.nudge_toward(message.from_agent, &message.hub).await;
                self.nudge_toward(message.to_agent, &message.hub).await;
                continue;
            }

            if !self.inner.store.mark_delivered(message.id).await? {
                continue;
            }
            info!(
                message_id = %message.id,
                hub = %message.hub,
                "message delivered"
            );
            self.apply_agent(message.from_agent, AgentEvent::RequestChat)
                .await;
            self.apply_agent(message.to_agent, AgentEvent::RequestChat)
                .await;

            let engine = self.clone();
            tokio::spawn(async move {
                if let Err(error) = engine.run_exchange(message).await {
                    warn!(%error, "exchange errored");
                }
            });
        }
        Ok(())
    }

    /// One face-to-face exchange: the recipient reacts to the message
    /// and both parties return to what they were doing.
    ///
    /// The reply is an utterance on the event bus only; it never spawns
    /// a task or subtask, and a failed call just ends the chat.
    pub(crate) async fn run_exchange(&self, message: AgentMessage) -> FleetResult<()> {
        let persona = {
            let roster = self.inner.roster.read().await;
            roster
                .get(&message.to_agent)
                .and_then(|a| self.inner.profiles.get(&a.role))
                .map(|p| p.persona.clone())
                .unwrap_or_default()
        };
        let prompt = format!(
            "A teammate walks up to you and says: \"{}\"\nAnswer them in one or two sentences.",
            message.content
        );

        match tokio::time::timeout(
            self.inner.config.reasoning_timeout(),
            self.inner.backend.complete(&persona, &prompt),
        )
        .await
        {
            Ok(Ok(text)) => {
                let reply = parse_reply(&text);
                let spoken = reply
                    .saying
                    .or_else(|| reply.output.map(|o| o.as_text()))
                    .unwrap_or(text);
                self.publish(FleetEvent::AgentSpoke {
                    agent_id: message.to_agent,
                    to_agent: Some(message.from_agent),
                    text: clip_words(&spoken, 30),
                });
            }
            Ok(Err(error)) => {
                warn!(message_id = %message.id, %error, "exchange reply failed");
            }
            Err(_) => {
                warn!(message_id = %message.id, "exchange reply timed out");
            }
        }

        self.apply_agent(message.from_agent, AgentEvent::EndChat)
            .await;
        self.apply_agent(message.to_agent, AgentEvent::EndChat)
            .await;
        Ok(())
    }
}
