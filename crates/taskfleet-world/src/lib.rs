//! The Taskfleet world model: named hubs, agent records with an explicit
//! state machine, and straight-line movement between hubs.
//!
//! The world never decides *when* something happens — the engine does.
//! This crate only validates and applies state, so multiple independent
//! worlds can be constructed and driven in tests.
//!
//! # Main types
//!
//! - [`Hub`] / [`HubRegistry`] — Named work locations, seeded once.
//! - [`Agent`] / [`AgentEvent`] — One worker and its legal transitions.
//! - [`Position`] / [`Movement`] — Continuous 2D positions and per-tick
//!   advancement toward a target hub.

/// Agent record and state machine.
pub mod agent;
/// Hub registry.
pub mod hub;
/// 2D positions and the movement controller.
pub mod movement;

pub use agent::{Agent, AgentEvent, AgentStatus};
pub use hub::{Hub, HubKind, HubRegistry};
pub use movement::{Movement, Position};
