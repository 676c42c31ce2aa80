//! # synapse-node
//!
//! One [`NodeActor`] per node id owns that node's config, virtual filesystem,
//! conversation history and attached terminal sessions. Terminal input is
//! line-edited keystroke by keystroke, then dispatched as a relay
//! (`@node message`), a builtin command, or a prompt for the fallback
//! generator.
//!
//! Actors live in an [`ActorDirectory`], which also provides the in-process
//! relay transport.

pub mod actor;
pub mod directives;
pub mod directory;
pub mod dispatch;
pub mod render;
pub mod services;
pub mod terminal;
pub mod vfs;

pub use actor::{NodeActor, SessionHandle};
pub use directory::{ActorDirectory, LocalRelay, RelayRoute};
pub use dispatch::BUILTINS;
pub use render::Reply;
pub use services::{NodeServices, NodeSettings};
pub use terminal::{LineBuffer, TerminalEvent};
pub use vfs::{FileSystem, NodeKind, VNode};
