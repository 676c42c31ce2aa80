//! Commands that talk to a running server over its HTTP API.

use serde::Serialize;
use serde::de::DeserializeOwned;
use synapse_core::{
    ActorId, ApiResponse, ExecuteRequest, ExecutionContext, RegisterRequest, RegistryEntry,
    SynapseError,
};
use synapse_mesh::{ExecuteResponse, execute_path};

struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .tcp_keepalive(None)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> synapse_core::Result<T> {
        let resp = self
            .http
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::unwrap(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> synapse_core::Result<T> {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .json(body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::unwrap(resp).await
    }

    fn unreachable(&self, e: reqwest::Error) -> SynapseError {
        SynapseError::unreachable(
            self.base.as_str(),
            format!("cannot reach server, is it running? ({e})"),
        )
    }

    async fn unwrap<T: DeserializeOwned>(resp: reqwest::Response) -> synapse_core::Result<T> {
        let status = resp.status();
        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| SynapseError::Other(anyhow::anyhow!("HTTP {status}: {e}")))?;
        envelope
            .into_result()
            .map_err(|e| SynapseError::Other(anyhow::anyhow!("HTTP {status}: {e}")))
    }
}

pub(super) async fn cmd_nodes(url: &str, json: bool) -> synapse_core::Result<()> {
    let nodes: Vec<RegistryEntry> = ApiClient::new(url).get("/api/mesh/nodes").await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }
    if nodes.is_empty() {
        println!("No nodes registered.");
        return Ok(());
    }
    println!("{:<20} {:<24} {:<10} REGISTERED", "ID", "NAME", "PERSONA");
    for node in nodes {
        println!(
            "{:<20} {:<24} {:<10} {}",
            node.id.as_str(),
            node.display_name,
            node.persona.as_str(),
            node.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub(super) async fn cmd_register(
    url: &str,
    id: String,
    name: Option<String>,
    persona: Option<String>,
) -> synapse_core::Result<()> {
    let request = RegisterRequest {
        id,
        display_name: name,
        persona,
    };
    let entry: RegistryEntry = ApiClient::new(url)
        .post("/api/mesh/register", &request)
        .await?;
    println!(
        "Registered {} as '{}' [{}]",
        entry.id, entry.display_name, entry.persona
    );
    Ok(())
}

pub(super) async fn cmd_exec(
    url: &str,
    id: &str,
    prompt: String,
    caller: &str,
) -> synapse_core::Result<()> {
    let target = ActorId::new(id)?;
    let request = ExecuteRequest {
        prompt,
        caller_id: ActorId::new(caller)?,
        context: ExecutionContext::default(),
    };
    let response: ExecuteResponse = ApiClient::new(url)
        .post(&execute_path(&target), &request)
        .await?;
    println!("{}", response.output.replace("\r\n", "\n"));
    Ok(())
}
