//! The reasoning-call boundary for Taskfleet.
//!
//! The engine treats the LLM as a black-box text-completion service behind
//! the [`ReasoningBackend`] trait. This crate provides the trait, an
//! OpenAI-compatible HTTP backend, and the parsers that turn free-text
//! replies into structured envelopes and plans — including the graceful
//! raw-text fallback for replies without a well-formed structured block.

/// `ReasoningBackend` trait and the HTTP backend.
pub mod backend;
/// Model configuration.
pub mod config;
/// Structured reply and plan parsing.
pub mod reply;

pub use backend::{HttpBackend, ReasoningBackend};
pub use config::ModelConfig;
pub use reply::{clip_words, parse_plan, parse_reply, AgentReply, PlanStep};
