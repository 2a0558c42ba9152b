//! The Taskfleet orchestration engine.
//!
//! A fixed-period tick scheduler drives four ordered phases — intake,
//! movement, work dispatch, message delivery — over a fleet of role-bound
//! agents in a small hub-gated office. Reasoning calls always run
//! off-tick; ticks only poll state and apply guarded mutations, so a
//! re-run tick never double-applies an effect.

/// Engine configuration.
pub mod config;
/// Intake and task decomposition.
pub mod decomposer;
/// The engine struct and tick scheduler.
pub mod engine;
/// Work dispatch and subtask execution.
pub mod executor;
/// Artifact packaging.
pub mod packager;
/// Role personas and home hubs.
pub mod profiles;
/// Co-location-gated message delivery.
pub mod router;

pub use config::EngineConfig;
pub use engine::{Engine, TaskSnapshot};
pub use packager::{ArtifactPackager, FilePackager, NoopPackager};
pub use profiles::{default_profiles, RoleProfile};
