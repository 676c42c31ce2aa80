use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration: maps to `synapse.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynapseConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub generator: GeneratorConfig,
    pub relay: RelayConfig,
    pub mesh: MeshConfig,
    pub logging: LoggingConfig,
    pub services: ServicesConfig,
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP/WebSocket listen address.
    pub listen: String,
    /// Enable permissive CORS (for browser terminals served elsewhere).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3710".into(),
            cors: false,
        }
    }
}

// ── Store ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Where actor state lives: "sqlite" or "memory".
    pub backend: StoreBackend,
    /// Path to the SQLite database. Relative paths resolve against the
    /// config file's directory.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db_path: PathBuf::from("synapse.db"),
        }
    }
}

// ── Generator ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Primary model identifier, e.g. "anthropic/claude-sonnet-4-20250514".
    pub model: String,
    /// Fallback model for when primary is unavailable.
    pub fallback_model: Option<String>,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Seconds before a generator call is abandoned.
    pub timeout_secs: u64,
    /// Conversation turns kept in memory per node.
    pub history_limit: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4-20250514".into(),
            fallback_model: None,
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 30,
            history_limit: 20,
        }
    }
}

// ── Relay ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    /// Call peers in-process through the actor directory.
    #[default]
    Local,
    /// Call peers over HTTP at `relay.base_url`.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mode: RelayMode,
    /// Base URL of the server hosting relay targets (http mode only).
    pub base_url: Option<String>,
    /// Seconds before a relay call is reported unreachable.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            mode: RelayMode::Local,
            base_url: None,
            timeout_secs: 45,
        }
    }
}

// ── Mesh ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Register a node in the mesh directory the first time it is created.
    pub auto_register: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            auto_register: true,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// External service API keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Anthropic API key. Falls back to ANTHROPIC_API_KEY.
    pub anthropic_api_key: Option<String>,
    /// OpenAI API key. Falls back to OPENAI_API_KEY.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: Option<String>,
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "[{}] {}: {}", tag, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " ({})", h)?;
        }
        Ok(())
    }
}

impl SynapseConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Generator model ───
        let model = &self.generator.model;
        if model.is_empty() {
            warnings.push(ConfigWarning {
                field: "generator.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'anthropic/claude-sonnet-4-20250514' or 'mock/echo'".into()),
            });
        } else if !model.contains('/') {
            warnings.push(ConfigWarning {
                field: "generator.model".into(),
                message: format!("model '{}' should be in 'provider/model' format", model),
                severity: WarningSeverity::Warning,
                hint: Some("Use 'anthropic/...', 'openai/...' or 'mock/...'".into()),
            });
        }

        if self.generator.temperature < 0.0 || self.generator.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "generator.temperature".into(),
                message: format!("temperature {} is out of range", self.generator.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }

        if self.generator.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "generator.max_tokens".into(),
                message: "max_tokens is 0, the fallback would never answer".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1024".into()),
            });
        }

        if self.generator.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "generator.timeout_secs".into(),
                message: "timeout is 0, every generator call would time out".into(),
                severity: WarningSeverity::Error,
                hint: None,
            });
        }

        if self.generator.history_limit == 0 {
            warnings.push(ConfigWarning {
                field: "generator.history_limit".into(),
                message: "history disabled, the fallback sees no prior turns".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Relay ───
        if self.relay.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "relay.timeout_secs".into(),
                message: "timeout is 0, every relay would be reported unreachable".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 45".into()),
            });
        }
        // A relayed prompt may fall through to the callee's generator.
        if self.relay.timeout_secs != 0 && self.relay.timeout_secs <= self.generator.timeout_secs {
            warnings.push(ConfigWarning {
                field: "relay.timeout_secs".into(),
                message: format!(
                    "relay timeout ({}s) does not exceed generator.timeout_secs ({}s), slow relayed prompts will be reported unreachable",
                    self.relay.timeout_secs, self.generator.timeout_secs
                ),
                severity: WarningSeverity::Warning,
                hint: Some(format!(
                    "Set to at least {}",
                    self.generator.timeout_secs + 15
                )),
            });
        }
        if self.relay.mode == RelayMode::Http {
            match self.relay.base_url.as_deref() {
                None | Some("") => warnings.push(ConfigWarning {
                    field: "relay.base_url".into(),
                    message: "http relay mode needs a base_url".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Set to e.g. 'http://127.0.0.1:3710'".into()),
                }),
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    warnings.push(ConfigWarning {
                        field: "relay.base_url".into(),
                        message: format!("'{}' is not an http(s) URL", url),
                        severity: WarningSeverity::Error,
                        hint: None,
                    })
                }
                Some(_) => {}
            }
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:3710'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0, terminals are reachable from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("The mesh has no authentication; prefer '127.0.0.1:3710'".into()),
            });
        }

        // ── Store ───
        if self.store.backend == StoreBackend::Memory {
            warnings.push(ConfigWarning {
                field: "store.backend".into(),
                message: "memory backend, node state is lost on restart".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Logging ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
