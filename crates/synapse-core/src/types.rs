use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SynapseError};
use crate::message::ConversationTurn;

/// Maximum length of an actor identity.
pub const MAX_ACTOR_ID_LEN: usize = 64;

/// Stable identity of a node actor. Used to locate the actor, as the registry
/// key, and as a relay address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(SynapseError::InvalidConfig("actor id is empty".into()));
        }
        if id.len() > MAX_ACTOR_ID_LEN {
            return Err(SynapseError::InvalidConfig(format!(
                "actor id longer than {MAX_ACTOR_ID_LEN} characters"
            )));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(SynapseError::InvalidConfig(format!(
                "actor id '{id}' contains invalid character '{bad}'"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActorId {
    type Err = SynapseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ActorId {
    type Error = SynapseError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ActorId> for String {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

/// Role tag shaping cosmetic output and the generator framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Coder,
    Reviewer,
    Security,
    #[default]
    System,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Coder,
        Persona::Reviewer,
        Persona::Security,
        Persona::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Coder => "coder",
            Persona::Reviewer => "reviewer",
            Persona::Security => "security",
            Persona::System => "system",
        }
    }

    /// Default system prompt for a freshly created node of this persona.
    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            Persona::Coder => {
                "You are a software engineer node. Answer with working code and short explanations."
            }
            Persona::Reviewer => {
                "You are a peer reviewer node. Point out defects, risks, and missing tests."
            }
            Persona::Security => {
                "You are a security auditor node. Look for vulnerabilities and unsafe defaults."
            }
            Persona::System => {
                "You are a system agent node in the Synapse mesh. Be concise and operational."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = SynapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "coder" => Ok(Persona::Coder),
            "reviewer" => Ok(Persona::Reviewer),
            "security" => Ok(Persona::Security),
            "system" => Ok(Persona::System),
            other => Err(SynapseError::InvalidConfig(format!(
                "unknown persona '{other}' (expected coder, reviewer, security or system)"
            ))),
        }
    }
}

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Online,
    Offline,
    Connecting,
    Error,
    Syncing,
    Processing,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Online => "online",
            NodeStatus::Offline => "offline",
            NodeStatus::Connecting => "connecting",
            NodeStatus::Error => "error",
            NodeStatus::Syncing => "syncing",
            NodeStatus::Processing => "processing",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = SynapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "online" => Ok(NodeStatus::Online),
            "offline" => Ok(NodeStatus::Offline),
            "connecting" => Ok(NodeStatus::Connecting),
            "error" => Ok(NodeStatus::Error),
            "syncing" => Ok(NodeStatus::Syncing),
            "processing" => Ok(NodeStatus::Processing),
            other => Err(SynapseError::InvalidConfig(format!("unknown status '{other}'"))),
        }
    }
}

/// Persisted configuration record of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorConfig {
    pub id: ActorId,
    pub display_name: String,
    pub persona: Persona,
    pub system_prompt: String,
    pub status: NodeStatus,
    /// Always a normalized absolute path.
    pub cwd: String,
    pub last_active: DateTime<Utc>,
}

impl ActorConfig {
    /// Defaults for a never-before-seen identity.
    pub fn new_default(id: ActorId) -> Self {
        let persona = Persona::default();
        Self {
            display_name: default_display_name(&id),
            id,
            persona,
            system_prompt: persona.default_system_prompt().to_string(),
            status: NodeStatus::default(),
            cwd: "/".to_string(),
            last_active: Utc::now(),
        }
    }
}

/// Display name generated for a fresh identity.
pub fn default_display_name(id: &ActorId) -> String {
    format!("node-{id}")
}

/// Partial update of an [`ActorConfig`].
///
/// Enumerated fields arrive as raw strings so unknown values surface as
/// `InvalidConfig` instead of a body-parsing rejection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, alias = "agentType", skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

impl ConfigPatch {
    pub fn persona(persona: impl Into<String>) -> Self {
        Self {
            persona: Some(persona.into()),
            ..Default::default()
        }
    }

    pub fn cwd(cwd: impl Into<String>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge into `current`, returning the new record stamped with `now`.
    /// Validation happens before anything is merged: `current` is never
    /// partially updated.
    pub fn apply(&self, current: &ActorConfig, now: DateTime<Utc>) -> Result<ActorConfig> {
        let persona = self.persona.as_deref().map(str::parse::<Persona>).transpose()?;
        let status = self.status.as_deref().map(str::parse::<NodeStatus>).transpose()?;
        let cwd = match self.cwd.as_deref() {
            Some(raw) => Some(crate::path::normalize_absolute(raw).ok_or_else(|| {
                SynapseError::InvalidConfig(format!("cwd '{raw}' is not an absolute path"))
            })?),
            None => None,
        };
        if let Some(name) = self.display_name.as_deref()
            && name.trim().is_empty()
        {
            return Err(SynapseError::InvalidConfig("displayName is empty".into()));
        }

        let mut next = current.clone();
        if let Some(name) = &self.display_name {
            next.display_name = name.trim().to_string();
        }
        if let Some(persona) = persona {
            next.persona = persona;
        }
        if let Some(prompt) = &self.system_prompt {
            next.system_prompt = prompt.clone();
        }
        if let Some(status) = status {
            next.status = status;
        }
        if let Some(cwd) = cwd {
            next.cwd = cwd;
        }
        next.last_active = now;
        Ok(next)
    }
}

/// One line of the mesh directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: ActorId,
    pub display_name: String,
    pub persona: Persona,
    pub created_at: DateTime<Utc>,
}

/// Body of a registration request (a [`RegistryEntry`] without `createdAt`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: Option<String>,
    #[serde(default, alias = "agentType")]
    pub persona: Option<String>,
}

impl RegisterRequest {
    /// Validate and turn into an entry stamped with `now`.
    pub fn into_entry(self, now: DateTime<Utc>) -> Result<RegistryEntry> {
        let id = ActorId::new(self.id)?;
        let persona = self
            .persona
            .as_deref()
            .map(str::parse::<Persona>)
            .transpose()?
            .unwrap_or_default();
        let display_name = self
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_display_name(&id));
        Ok(RegistryEntry {
            id,
            display_name,
            persona,
            created_at: now,
        })
    }
}

/// Actor-local counters, persisted next to the config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActorStats {
    pub sessions_opened: u64,
    pub commands_executed: u64,
    pub relays_sent: u64,
    pub relays_received: u64,
}

/// Working context a caller hands to a relay callee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionContext {
    pub cwd: String,
    pub fs_summary: Vec<String>,
    pub history: Vec<ConversationTurn>,
}

/// Body of a relay call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub prompt: String,
    pub caller_id: ActorId,
    #[serde(default)]
    pub context: ExecutionContext,
}
