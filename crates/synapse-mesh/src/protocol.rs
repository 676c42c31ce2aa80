use serde::{Deserialize, Serialize};
use synapse_core::ActorId;

/// Payload returned by a relay callee inside the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    /// Node that ran the prompt.
    pub node_id: ActorId,
    /// Rendered terminal text, lines separated by `\r\n`.
    pub output: String,
}

/// Route a relay call is posted to.
pub fn execute_path(target: &ActorId) -> String {
    format!("/api/terminal/{target}/execute")
}

/// Heading printed above a relayed response.
pub fn response_heading(target: &str) -> String {
    format!("── response from {target} ──")
}
