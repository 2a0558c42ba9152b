//! Core types and error definitions for Taskfleet.
//!
//! This crate provides the foundational types shared across all Taskfleet
//! crates: the unified error enum, agent roles, and the task/subtask/message
//! records that the scheduler, store, and gateway all operate on.
//!
//! # Main types
//!
//! - [`FleetError`] — Unified error enum for all Taskfleet subsystems.
//! - [`FleetResult`] — Convenience alias for `Result<T, FleetError>`.
//! - [`AgentRole`] — Fixed set of worker specializations.
//! - [`Task`] / [`Subtask`] — The orchestrated units of work.
//! - [`AgentMessage`] — A co-location-gated inter-agent message.
//! - [`RoleOutput`] — Typed, role-specific result of a subtask.

/// Task, subtask, message, and artifact records.
pub mod model;

pub use model::{
    AgentMessage, AgentRole, Artifact, CodeFile, RoleOutput, Subtask, SubtaskStatus, Task,
    TaskStatus,
};

/// Top-level error type for Taskfleet.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// An error from the orchestration engine or one of its tick phases.
    #[error("Engine error: {0}")]
    Engine(String),

    /// An error from the world model (hubs, movement, agent state machine).
    #[error("World error: {0}")]
    World(String),

    /// An illegal agent state transition. Callers log this and leave the
    /// agent's state untouched; it is never fatal.
    #[error("Illegal transition: agent {agent} cannot {event} while {status}")]
    IllegalTransition {
        /// Display name of the agent.
        agent: String,
        /// The rejected transition event.
        event: String,
        /// The agent's current status.
        status: String,
    },

    /// An error from the external reasoning call (HTTP failure, timeout,
    /// malformed provider response).
    #[error("Reasoning error: {0}")]
    Reason(String),

    /// An error from the persistence layer.
    #[error("Store error: {0}")]
    Store(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`FleetError`].
pub type FleetResult<T> = Result<T, FleetError>;
