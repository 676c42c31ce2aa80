//! # synapse-mesh
//!
//! Discovery and calling between Synapse nodes. The [`MeshRegistry`] lists
//! every node that joined the mesh; a [`RelayClient`] turns `@target prompt`
//! into a synchronous call on another node through a [`RelayTransport`].

pub mod protocol;
pub mod registry;
pub mod relay;

pub use protocol::{ExecuteResponse, execute_path, response_heading};
pub use registry::MeshRegistry;
pub use relay::{HttpRelay, RelayClient, RelayTransport};
