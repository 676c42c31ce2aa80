use thiserror::Error;

/// Unified error type for the Synapse mesh.
#[derive(Error, Debug)]
pub enum SynapseError {
    // ── Actor state errors ─────────────────────────────────────
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    StorageError(String),

    // ── Relay errors ───────────────────────────────────────────
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("peer unreachable: {peer}: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    // ── Fallback generator errors ──────────────────────────────
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("generator failure: {0}")]
    GeneratorFailure(String),

    #[error("llm rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── Builtin errors ─────────────────────────────────────────
    #[error("{command}: {reason}")]
    BuiltinUsage { command: String, reason: String },

    // ── Process config errors ──────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SynapseError {
    /// Shorthand for a builtin usage error.
    pub fn usage(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BuiltinUsage {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unreachable peer.
    pub fn unreachable(peer: impl Into<String>, reason: impl ToString) -> Self {
        Self::PeerUnreachable {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable kind, used in logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "InvalidConfig",
            Self::StorageError(_) => "StorageError",
            Self::PeerNotFound(_) => "PeerNotFound",
            Self::PeerUnreachable { .. } => "PeerUnreachable",
            Self::GeneratorUnavailable(_) => "GeneratorUnavailable",
            Self::GeneratorFailure(_) | Self::RateLimited { .. } => "GeneratorFailure",
            Self::BuiltinUsage { .. } => "BuiltinUsageError",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
            Self::Serialization(_) => "Serialization",
            Self::Other(_) => "Other",
        }
    }
}

pub type Result<T> = std::result::Result<T, SynapseError>;
