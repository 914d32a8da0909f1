//! # controlgate Core
//!
//! Domain types for the agent runtime that controlgate governs.
//! This crate has **zero framework dependencies**: it models the
//! conversation state a host agent hands to the control-layer hooks.
//!
//! ## Design Philosophy
//!
//! The governance engine never owns the agent's conversation. It reads it
//! through the [`AgentState`] trait, so any host (a graph runtime, a simple
//! chat loop, a replayed transcript) can plug in by exposing its message
//! history.

pub mod error;
pub mod message;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Conversation, ConversationId, Message, Role};
pub use state::AgentState;
pub use tool::ToolDefinition;
