use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use synapse_config::{ConfigLoader, SynapseConfig};
use synapse_core::SynapseError;

mod remote;
mod serve;

/// Synapse: a mesh of persistent terminal agents
#[derive(Parser)]
#[command(name = "synapse", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to synapse.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Base URL of a running server (defaults to http://<server.listen>)
    #[arg(long, global = true, env = "SYNAPSE_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/WebSocket server
    Serve {
        /// Address to listen on, overriding server.listen
        #[arg(short = 'L', long)]
        listen: Option<String>,
    },
    /// List nodes registered in the mesh
    Nodes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Register a node in the mesh
    Register {
        /// Node id
        id: String,
        /// Display name (defaults to node-<id>)
        #[arg(short, long)]
        name: Option<String>,
        /// Persona: coder, reviewer, security or system
        #[arg(short, long)]
        persona: Option<String>,
    },
    /// Run a prompt on a node the way a relay would, and print its output
    Exec {
        /// Target node id
        id: String,
        /// Prompt or command line
        prompt: String,
        /// Caller id reported to the target
        #[arg(long, default_value = "cli")]
        caller: String,
    },
    /// Show version and build info
    Version,
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn run(self) -> synapse_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // --verbose > --quiet > --log-level > logging.level
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };
        init_tracing(&config, log_level);

        let url = self
            .url
            .clone()
            .unwrap_or_else(|| format!("http://{}", config.server.listen));

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config_loader, listen).await,
            Commands::Nodes { json } => remote::cmd_nodes(&url, json).await,
            Commands::Register { id, name, persona } => {
                remote::cmd_register(&url, id, name, persona).await
            }
            Commands::Exec { id, prompt, caller } => {
                remote::cmd_exec(&url, &id, prompt, &caller).await
            }
            Commands::Version => Self::cmd_version(),
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Completions { shell } => Self::cmd_completions(shell),
        }
    }

    fn cmd_version() -> synapse_core::Result<()> {
        println!("Synapse v{}", env!("CARGO_PKG_VERSION"));
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }

    fn cmd_config(config: &SynapseConfig, json: bool) -> synapse_core::Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config).map_err(|e| SynapseError::Config(e.to_string()))?
        };
        println!("{rendered}");
        Ok(())
    }

    fn cmd_completions(shell: Shell) -> synapse_core::Result<()> {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "synapse", &mut std::io::stdout());
        Ok(())
    }
}

/// `RUST_LOG` wins over `level`; `logging.format = "json"` switches to JSON lines.
fn init_tracing(config: &SynapseConfig, level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
