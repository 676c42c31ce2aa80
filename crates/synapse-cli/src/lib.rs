//! # synapse-cli
//!
//! Command-line interface for the Synapse mesh.
//!
//! ## Commands
//!
//! - `synapse serve`: Run the HTTP/WebSocket server
//! - `synapse nodes`: List registered nodes
//! - `synapse register`: Add a node to the registry
//! - `synapse exec`: Run a prompt on a node, as a relay would
//! - `synapse config`: Show the effective configuration

pub mod commands;

pub use commands::Cli;
