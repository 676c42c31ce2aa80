//! Command dispatch for one submitted line: relay, builtin, or fallback
//! generator, in that order.

use chrono::Utc;
use synapse_core::{
    ActorConfig, ActorId, ActorStats, ConfigPatch, ConversationTurn, ExecutionContext, History,
    Result, SynapseError, path,
};
use synapse_mesh::response_heading;
use synapse_store::{keys, put_json};
use tracing::{debug, info, warn};

use crate::directives;
use crate::render::{Reply, agent_line};
use crate::services::NodeServices;
use crate::vfs::FileSystem;

/// Commands handled locally without the generator.
pub const BUILTINS: &[&str] = &[
    "help", "ls", "mkdir", "touch", "rm", "cat", "cd", "echo", "pwd", "whoami", "status", "ping",
    "nodes", "clear",
];

const HELP: &[(&str, &str)] = &[
    ("help", "Show this menu"),
    ("ls", "List files in the root directory"),
    ("mkdir <name>", "Create a directory"),
    ("touch <name>", "Create an empty file"),
    ("rm <name>", "Remove a file or directory"),
    ("cat <name>", "Print a file"),
    ("cd <path>", "Change the working directory"),
    ("echo <text> [> <name>]", "Print text, or write it to a file"),
    ("pwd", "Print the working directory"),
    ("whoami", "Display node identity"),
    ("status", "Node diagnostics"),
    ("ping", "Liveness check"),
    ("nodes", "List nodes in the mesh"),
    ("clear", "Clear the terminal"),
    ("@<node> <message>", "Relay a message to another node"),
];

/// Persisted state of a hydrated node.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub config: ActorConfig,
    pub fs: FileSystem,
    pub stats: ActorStats,
}

/// Where a line came from.
#[derive(Debug, Clone, Copy)]
pub enum Origin<'a> {
    /// Typed into one of this node's sessions.
    Terminal,
    /// Sent by another node through the relay.
    Relay {
        caller: &'a ActorId,
        context: &'a ExecutionContext,
    },
}

pub struct Dispatcher<'a> {
    pub id: &'a ActorId,
    pub services: &'a NodeServices,
    pub node: &'a mut NodeState,
    pub history: &'a mut History,
    pub sessions: usize,
}

impl Dispatcher<'_> {
    /// Run one non-empty line and render the result.
    pub async fn run(&mut self, line: &str, origin: Origin<'_>) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::empty();
        }
        self.node.stats.commands_executed += 1;

        let reply = if let Some(rest) = line.strip_prefix('@') {
            self.relay(rest).await
        } else {
            let (command, args) = split_command(line);
            match self.builtin(&command, args).await {
                Some(reply) => reply,
                None => self.fallback(line, origin).await,
            }
        };

        self.save_stats().await;
        reply
    }

    // ── Builtins ───────────────────────────────────────────────

    async fn builtin(&mut self, command: &str, args: &str) -> Option<Reply> {
        let reply = match command {
            "help" => Reply::lines(
                HELP.iter()
                    .map(|(cmd, desc)| format!("  {cmd:<24} {desc}"))
                    .collect(),
            ),
            "ls" => Reply::lines(self.node.fs.ls()),
            "mkdir" => {
                self.mutate_fs(|fs| fs.mkdir(args).map(|()| format!("created directory {args}")))
                    .await
            }
            "touch" => {
                self.mutate_fs(|fs| fs.touch(args).map(|()| format!("created file {args}")))
                    .await
            }
            "rm" => {
                self.mutate_fs(|fs| fs.rm(args).map(|node| format!("removed {}", node.label())))
                    .await
            }
            "cat" => match self.node.fs.cat(args) {
                Ok(content) => {
                    let mut reply = Reply::empty();
                    reply.push_text(&content);
                    reply
                }
                Err(e) => Reply::error(e),
            },
            "echo" => self.echo(args).await,
            "cd" => self.cd(args).await,
            "pwd" => Reply::line(self.node.config.cwd.clone()),
            "whoami" => Reply::lines(vec![
                format!("{} ({})", self.node.config.display_name, self.id),
                format!("persona: {}", self.node.config.persona),
                format!("status: {}", self.node.config.status),
            ]),
            "status" => self.status(),
            "ping" => Reply::line("PONG"),
            "nodes" => self.nodes().await,
            "clear" => Reply::clear_screen(),
            _ => return None,
        };
        Some(reply)
    }

    /// Apply a filesystem change and persist it; the tree is rolled back when
    /// the write fails. `change` returns the confirmation line.
    async fn mutate_fs<F>(&mut self, change: F) -> Reply
    where
        F: FnOnce(&mut FileSystem) -> Result<String>,
    {
        let snapshot = self.node.fs.clone();
        let confirmation = match change(&mut self.node.fs) {
            Ok(line) => line,
            Err(e) => return Reply::error(e),
        };
        if let Err(e) = put_json(&*self.services.store, self.id.as_str(), keys::FS, &self.node.fs).await {
            warn!(actor = %self.id, error = %e, "filesystem write failed, rolling back");
            self.node.fs = snapshot;
            return Reply::error(e);
        }
        Reply::line(confirmation)
    }

    async fn echo(&mut self, args: &str) -> Reply {
        match split_redirect(args) {
            Some((text, target)) => {
                let text = unquote(text.trim_end_matches('>'));
                let target = target.trim().to_string();
                self.mutate_fs(|fs| {
                    fs.write(&target, &text)
                        .map(|()| format!("wrote {} bytes to {target}", text.len()))
                })
                .await
            }
            None => Reply::line(unquote(args)),
        }
    }

    async fn cd(&mut self, args: &str) -> Reply {
        let arg = if args.trim().is_empty() { "/" } else { args };
        let target = path::resolve(&self.node.config.cwd, arg);
        match self.apply_patch(ConfigPatch::cwd(target)).await {
            Ok(()) => Reply::empty(),
            Err(e) => Reply::error(e),
        }
    }

    fn status(&self) -> Reply {
        let stats = &self.node.stats;
        Reply::lines(vec![
            format!("node:       {} ({})", self.id, self.node.config.display_name),
            format!("persona:    {}", self.node.config.persona),
            format!("status:     {}", self.node.config.status),
            format!("sessions:   {}", self.sessions),
            format!("fs entries: {}", self.node.fs.len()),
            format!(
                "commands:   {} executed, {} relays sent, {} relays received",
                stats.commands_executed, stats.relays_sent, stats.relays_received
            ),
            format!("storage:    {}", self.services.store.name()),
            format!(
                "generator:  {}",
                if self.services.generator.is_some() { "ready" } else { "unavailable" }
            ),
        ])
    }

    async fn nodes(&self) -> Reply {
        match self.services.registry.list_nodes().await {
            Ok(nodes) if nodes.is_empty() => Reply::line("(no nodes registered)"),
            Ok(nodes) => Reply::lines(
                nodes
                    .iter()
                    .map(|n| {
                        let marker = if &n.id == self.id { "*" } else { " " };
                        format!("{marker} {:<16} {:<20} [{}]", n.id.as_str(), n.display_name, n.persona)
                    })
                    .collect(),
            ),
            Err(e) => Reply::error(e),
        }
    }

    /// Merge a patch into the cached config and persist it without notifying
    /// sessions. The cache only changes when the write succeeds.
    async fn apply_patch(&mut self, patch: ConfigPatch) -> Result<()> {
        let next = patch.apply(&self.node.config, Utc::now())?;
        put_json(&*self.services.store, self.id.as_str(), keys::CONFIG, &next).await?;
        self.node.config = next;
        Ok(())
    }

    async fn save_stats(&self) {
        if let Err(e) =
            put_json(&*self.services.store, self.id.as_str(), keys::STATS, &self.node.stats).await
        {
            warn!(actor = %self.id, error = %e, "failed to persist stats");
        }
    }

    // ── Relay ──────────────────────────────────────────────────

    async fn relay(&mut self, body: &str) -> Reply {
        let Some((target, message)) = body
            .split_once(char::is_whitespace)
            .map(|(t, m)| (t, m.trim()))
            .filter(|(t, m)| !t.is_empty() && !m.is_empty())
        else {
            return Reply::error("relay syntax: @<node> <message>");
        };

        self.node.stats.relays_sent += 1;
        let context = ExecutionContext {
            cwd: self.node.config.cwd.clone(),
            fs_summary: self.node.fs.ls(),
            history: self.history.recent(self.services.settings.history_limit),
        };

        match self.services.relay.call(self.id, target, message, context).await {
            Ok((entry, output)) => {
                let mut reply = Reply::line(response_heading(entry.id.as_str()));
                reply.push_text(&output);
                reply
            }
            Err(e) => {
                info!(actor = %self.id, target, error = %e, "relay failed");
                Reply::error(e)
            }
        }
    }

    // ── Fallback generator ─────────────────────────────────────

    async fn fallback(&mut self, line: &str, origin: Origin<'_>) -> Reply {
        let Some(generator) = self.services.generator.clone() else {
            return Reply::error(SynapseError::GeneratorUnavailable(
                "no generator configured".into(),
            ));
        };

        let turns = self.build_turns(line, origin);
        let timeout = self.services.settings.generator_timeout;
        let raw = match tokio::time::timeout(timeout, generator.generate(&turns)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(actor = %self.id, error = %e, "generator failed");
                return Reply::error(as_generator_error(e));
            }
            Err(_) => {
                warn!(actor = %self.id, timeout_ms = timeout.as_millis() as u64, "generator timed out");
                return Reply::error(SynapseError::GeneratorFailure(format!(
                    "no reply within {timeout:?}"
                )));
            }
        };

        let extracted = directives::extract(&raw);
        for directive in &extracted.directives {
            self.run_directive(directive).await;
        }

        if matches!(origin, Origin::Terminal) {
            self.history.push(ConversationTurn::user(line));
            self.history
                .push(ConversationTurn::assistant(extracted.visible.clone()));
        }

        let mut reply = Reply::empty();
        let mut lines = extracted.visible.lines();
        match lines.next() {
            Some(first) => reply.lines.push(agent_line(first)),
            None if !extracted.directives.is_empty() => reply.lines.push(agent_line(&format!(
                "ran {} directive(s)",
                extracted.directives.len()
            ))),
            None => {}
        }
        reply.lines.extend(lines.map(str::to_string));
        reply
    }

    /// Run a `[[...]]` directive from a generator reply. Only builtins are
    /// honoured; their output is discarded.
    async fn run_directive(&mut self, directive: &str) {
        let (command, args) = split_command(directive);
        if !BUILTINS.contains(&command.as_str()) {
            warn!(actor = %self.id, directive, "ignoring directive that is not a builtin");
            return;
        }
        if let Some(reply) = self.builtin(&command, args).await {
            debug!(actor = %self.id, directive, output = ?reply.lines, "directive executed");
        }
    }

    fn build_turns(&self, line: &str, origin: Origin<'_>) -> Vec<ConversationTurn> {
        let config = &self.node.config;
        let files = self.node.fs.ls();
        let mut system = format!(
            "{}\n\nYou are node '{}' ({}), persona: {}.\nWorking directory: {}\nFiles: {}",
            config.system_prompt,
            self.id,
            config.display_name,
            config.persona,
            config.cwd,
            summarize(&files),
        );

        let history = match origin {
            Origin::Terminal => self.history.recent(self.services.settings.history_limit),
            Origin::Relay { caller, context } => {
                system.push_str(&format!(
                    "\n\nThis request was relayed from node '{}'. Caller working directory: {}. Caller files: {}",
                    caller,
                    if context.cwd.is_empty() { "/" } else { &context.cwd },
                    summarize(&context.fs_summary),
                ));
                context.history.clone()
            }
        };

        system.push_str(
            "\n\nYou can act on your own filesystem by embedding directives such as \
             [[mkdir src]], [[touch notes.txt]] or [[echo hello > notes.txt]] in your reply. \
             Supported: ls, mkdir, touch, rm, cat, cd, echo. Directives run silently and are \
             removed from the text the user sees.",
        );

        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ConversationTurn::system(system));
        turns.extend(history);
        turns.push(ConversationTurn::user(line));
        turns
    }
}

fn summarize(files: &[String]) -> String {
    if files.is_empty() {
        "(empty)".to_string()
    } else {
        files.join(", ")
    }
}

/// Errors from the generator boundary always render as generator errors.
fn as_generator_error(e: SynapseError) -> SynapseError {
    match e {
        SynapseError::GeneratorUnavailable(_) | SynapseError::GeneratorFailure(_) => e,
        SynapseError::RateLimited { .. } => SynapseError::GeneratorFailure(e.to_string()),
        other => SynapseError::GeneratorFailure(other.to_string()),
    }
}

/// Split a line into a lowercased command word and the untouched rest.
fn split_command(line: &str) -> (String, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    }
}

/// Split `text > target` at the last `>` that is not inside quotes.
fn split_redirect(args: &str) -> Option<(&str, &str)> {
    let mut quote = None;
    let mut split = None;
    for (i, ch) in args.char_indices() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => split = Some(i),
            None => {}
        }
    }
    split.map(|i| (&args[..i], &args[i + 1..]))
}

/// Strip one pair of matching surrounding quotes.
fn unquote(text: &str) -> String {
    let text = text.trim();
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}
