use crate::movement::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use taskfleet_core::{FleetError, FleetResult};

/// What a hub is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubKind {
    /// A desk where subtask work happens.
    Work,
    /// A shared space used for inter-agent exchanges and celebrations.
    Social,
    /// Where finished work is handed off.
    Deploy,
}

/// A named location agents can occupy. Immutable after seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    /// Stable identifier used in subtasks and messages.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the hub is for.
    pub kind: HubKind,
    /// Where the hub sits in the office.
    pub position: Position,
    /// Maximum simultaneous occupants.
    pub capacity: u32,
}

impl Hub {
    /// New hub at the given coordinates.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: HubKind,
        x: f64,
        y: f64,
        capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            position: Position::new(x, y),
            capacity,
        }
    }
}

/// Read-only lookup of hubs by id.
#[derive(Debug, Clone)]
pub struct HubRegistry {
    hubs: HashMap<String, Hub>,
}

impl HubRegistry {
    /// Registry over the given hubs, keyed by id.
    pub fn new(hubs: Vec<Hub>) -> Self {
        Self {
            hubs: hubs.into_iter().map(|h| (h.id.clone(), h)).collect(),
        }
    }

    /// The default office layout: one work hub per worker role, a social
    /// lounge, and a deploy pad.
    pub fn seed() -> Self {
        Self::new(vec![
            Hub::new("planning_desk", "Planning Desk", HubKind::Work, 2.0, 2.0, 4),
            Hub::new("design_studio", "Design Studio", HubKind::Work, 8.0, 2.0, 4),
            Hub::new("build_bay", "Build Bay", HubKind::Work, 14.0, 2.0, 4),
            Hub::new("test_bench", "Test Bench", HubKind::Work, 8.0, 8.0, 4),
            Hub::new("review_corner", "Review Corner", HubKind::Work, 14.0, 8.0, 4),
            Hub::new("lounge", "The Lounge", HubKind::Social, 2.0, 8.0, 12),
            Hub::new("deploy_pad", "Deploy Pad", HubKind::Deploy, 20.0, 5.0, 4),
        ])
    }

    /// Look up a hub by id.
    pub fn get(&self, id: &str) -> Option<&Hub> {
        self.hubs.get(id)
    }

    /// Look up a hub, failing with a descriptive error if unknown.
    pub fn require(&self, id: &str) -> FleetResult<&Hub> {
        self.hubs
            .get(id)
            .ok_or_else(|| FleetError::World(format!("unknown hub '{id}'")))
    }

    /// The first social hub, used for help exchanges and celebrations.
    pub fn social_hub(&self) -> Option<&Hub> {
        let mut social: Vec<&Hub> = self
            .hubs
            .values()
            .filter(|h| h.kind == HubKind::Social)
            .collect();
        social.sort_by(|a, b| a.id.cmp(&b.id));
        social.into_iter().next()
    }

    /// Number of hubs.
    pub fn len(&self) -> usize {
        self.hubs.len()
    }

    /// True when no hubs are registered.
    pub fn is_empty(&self) -> bool {
        self.hubs.is_empty()
    }

    /// All hubs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Hub> {
        self.hubs.values()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_layout() {
        let registry = HubRegistry::seed();
        assert_eq!(registry.len(), 7);
        assert!(registry.get("lounge").is_some());
        assert!(registry.get("build_bay").is_some());
        assert_eq!(registry.get("deploy_pad").unwrap().kind, HubKind::Deploy);
    }

    #[test]
    fn test_require_unknown_hub() {
        let registry = HubRegistry::seed();
        let err = registry.require("basement").unwrap_err();
        assert!(err.to_string().contains("basement"));
    }

    #[test]
    fn test_social_hub() {
        let registry = HubRegistry::seed();
        assert_eq!(registry.social_hub().unwrap().id, "lounge");
    }
}
