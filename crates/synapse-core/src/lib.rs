//! # synapse-core
//!
//! Core types and primitives for the Synapse terminal mesh. This crate defines
//! the shared vocabulary used by every other crate in the workspace: actor
//! identities and configuration records, registry entries, relay payloads,
//! the error taxonomy, and the JSON response envelope.

pub mod api;
pub mod error;
pub mod message;
pub mod path;
pub mod types;

pub use api::ApiResponse;
pub use error::{Result, SynapseError};
pub use message::{ConversationTurn, History, Role};
pub use types::*;
