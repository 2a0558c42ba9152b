//! HTTP submission surface and WebSocket event feed.
//!
//! The gateway is a thin layer over [`Engine`]: it validates requests,
//! forwards them, and maps errors to JSON bodies with proper status
//! codes. All orchestration decisions live in the engine.

/// Router construction and request handlers.
pub mod server;

pub use server::{AppState, GatewayServer};
