use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use synapse_core::{
    ActorId, ApiResponse, ExecuteRequest, ExecutionContext, RegistryEntry, Result, SynapseError,
};
use tracing::{debug, info, warn};

use crate::protocol::{ExecuteResponse, execute_path};
use crate::registry::MeshRegistry;

/// Delivers a prompt to another node and returns its rendered output.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, target: &ActorId, request: ExecuteRequest) -> Result<String>;
}

/// Relay over HTTP to a Synapse server hosting the target node.
pub struct HttpRelay {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRelay {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynapseError::Config(format!("failed to build relay client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RelayTransport for HttpRelay {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, target: &ActorId, request: ExecuteRequest) -> Result<String> {
        let url = format!("{}{}", self.base_url, execute_path(target));
        debug!(%url, caller = %request.caller_id, "posting relay request");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynapseError::unreachable(target.as_str(), e))?;

        let status = resp.status();
        let envelope: ApiResponse<ExecuteResponse> = resp.json().await.map_err(|e| {
            SynapseError::unreachable(target.as_str(), format!("HTTP {status}: {e}"))
        })?;

        envelope
            .into_result()
            .map(|r| r.output)
            .map_err(|e| SynapseError::unreachable(target.as_str(), e))
    }
}

/// Caller side of the relay protocol: resolve, refuse self-calls, call the
/// transport under a deadline.
pub struct RelayClient {
    registry: Arc<MeshRegistry>,
    transport: Arc<dyn RelayTransport>,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(
        registry: Arc<MeshRegistry>,
        transport: Arc<dyn RelayTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            timeout,
        }
    }

    pub fn registry(&self) -> &Arc<MeshRegistry> {
        &self.registry
    }

    /// Relay `prompt` from `caller` to the node registered as `target`.
    ///
    /// Returns the resolved entry and the callee's output. An unknown target
    /// fails with `PeerNotFound` before the transport is touched; transport
    /// errors and deadline overruns become `PeerUnreachable`.
    pub async fn call(
        &self,
        caller: &ActorId,
        target: &str,
        prompt: &str,
        context: ExecutionContext,
    ) -> Result<(RegistryEntry, String)> {
        let entry = self
            .registry
            .resolve(target)
            .await?
            .ok_or_else(|| SynapseError::PeerNotFound(target.to_string()))?;

        if &entry.id == caller {
            return Err(SynapseError::usage("relay", "cannot relay to self"));
        }

        let request = ExecuteRequest {
            prompt: prompt.to_string(),
            caller_id: caller.clone(),
            context,
        };

        info!(caller = %caller, target = %entry.id, transport = self.transport.name(), "relay start");
        let output = match tokio::time::timeout(
            self.timeout,
            self.transport.execute(&entry.id, request),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(SynapseError::PeerNotFound(_))) => {
                return Err(SynapseError::PeerNotFound(target.to_string()));
            }
            Ok(Err(e @ SynapseError::PeerUnreachable { .. })) => return Err(e),
            Ok(Err(e)) => {
                warn!(target = %entry.id, error = %e, "relay failed");
                return Err(SynapseError::unreachable(entry.id.as_str(), e));
            }
            Err(_) => {
                warn!(target = %entry.id, timeout_ms = self.timeout.as_millis() as u64, "relay timed out");
                return Err(SynapseError::unreachable(
                    entry.id.as_str(),
                    format!("no response within {:?}", self.timeout),
                ));
            }
        };
        info!(caller = %caller, target = %entry.id, "relay complete");

        Ok((entry, output))
    }
}
