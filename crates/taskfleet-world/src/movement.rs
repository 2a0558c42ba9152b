use crate::agent::{Agent, AgentEvent, AgentStatus};
use crate::hub::HubRegistry;
use serde::{Deserialize, Serialize};
use taskfleet_core::FleetResult;

/// A continuous 2D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Position at the given coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Straight-line distance to `other`.
    pub fn distance(&self, other: Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move at most `step` units toward `target` along the straight line.
    /// Never overshoots: the actual displacement is `min(step, distance)`.
    pub fn step_toward(&self, target: Position, step: f64) -> Position {
        let dist = self.distance(target);
        if dist <= step || dist == 0.0 {
            return target;
        }
        let ratio = step / dist;
        Position {
            x: self.x + (target.x - self.x) * ratio,
            y: self.y + (target.y - self.y) * ratio,
        }
    }
}

/// Advances traveling agents a fixed distance per tick and declares
/// arrival once the remaining distance drops below the threshold.
#[derive(Debug, Clone)]
pub struct Movement {
    /// Units covered per tick.
    pub speed: f64,
    /// Remaining distance below which an agent has arrived.
    pub arrival_threshold: f64,
}

impl Movement {
    /// Movement at the given speed with the default arrival threshold.
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            arrival_threshold: 0.1,
        }
    }

    /// Advance one agent toward its target hub.
    ///
    /// Returns the hub id on arrival, `None` while still underway or when
    /// the agent is not traveling. Arrival applies [`AgentEvent::Arrive`],
    /// which clears the target and sets the current hub atomically.
    pub fn advance(&self, agent: &mut Agent, hubs: &HubRegistry) -> FleetResult<Option<String>> {
        if agent.status != AgentStatus::Traveling {
            return Ok(None);
        }
        let Some(target_id) = agent.target_hub.clone() else {
            return Ok(None);
        };
        let target = hubs.require(&target_id)?.position;

        agent.position = agent.position.step_toward(target, self.speed);

        if agent.position.distance(target) < self.arrival_threshold {
            agent.position = target;
            agent.apply(AgentEvent::Arrive)?;
            return Ok(Some(target_id));
        }
        Ok(None)
    }
}

impl Default for Movement {
    fn default() -> Self {
        Self::new(1.5)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use taskfleet_core::AgentRole;
    use uuid::Uuid;

    fn traveling_agent(to: &str) -> Agent {
        let mut agent = Agent::new(Uuid::new_v4(), "walker", AgentRole::Coder, Position::new(0.0, 0.0));
        agent.current_hub = Some("lounge".into());
        agent.apply(AgentEvent::StartTravel { hub: to.into() }).unwrap();
        agent
    }

    #[test]
    fn test_step_toward_is_monotonic() {
        let start = Position::new(0.0, 0.0);
        let target = Position::new(10.0, 0.0);
        let mut pos = start;
        let mut last_dist = pos.distance(target);
        for _ in 0..20 {
            pos = pos.step_toward(target, 1.5);
            let dist = pos.distance(target);
            assert!(dist <= last_dist);
            last_dist = dist;
        }
        assert_eq!(pos, target);
    }

    #[test]
    fn test_step_never_overshoots() {
        let pos = Position::new(0.0, 0.0);
        let target = Position::new(0.5, 0.0);
        let stepped = pos.step_toward(target, 2.0);
        assert_eq!(stepped, target);
    }

    #[test]
    fn test_advance_until_arrival() {
        let hubs = HubRegistry::seed();
        // planning_desk is at (2, 2): distance ~2.83 from origin.
        let mut agent = traveling_agent("planning_desk");
        let movement = Movement::new(1.5);

        let first = movement.advance(&mut agent, &hubs).unwrap();
        assert!(first.is_none());
        assert_eq!(agent.status, AgentStatus::Traveling);

        let second = movement.advance(&mut agent, &hubs).unwrap();
        assert_eq!(second.as_deref(), Some("planning_desk"));
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.current_hub.as_deref(), Some("planning_desk"));
        assert!(agent.target_hub.is_none());
    }

    #[test]
    fn test_advance_ignores_non_traveling_agents() {
        let hubs = HubRegistry::seed();
        let mut agent =
            Agent::new(Uuid::new_v4(), "idler", AgentRole::Tester, Position::new(1.0, 1.0));
        let movement = Movement::default();
        assert!(movement.advance(&mut agent, &hubs).unwrap().is_none());
        assert_eq!(agent.position, Position::new(1.0, 1.0));
    }

    #[test]
    fn test_advance_unknown_hub_errors() {
        let hubs = HubRegistry::seed();
        let mut agent = traveling_agent("attic");
        let movement = Movement::default();
        assert!(movement.advance(&mut agent, &hubs).is_err());
    }
}
