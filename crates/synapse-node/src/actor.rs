use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use synapse_core::{
    ActorConfig, ActorId, ActorStats, ConfigPatch, ExecuteRequest, History, Result, SynapseError,
};
use synapse_store::{get_json, keys, put_json};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatch::{Dispatcher, NodeState, Origin};
use crate::render::{self, NEWLINE, Reply};
use crate::services::NodeServices;
use crate::terminal::{LineBuffer, TerminalEvent};
use crate::vfs::{FileSystem, VNode};

/// One attached terminal.
struct SessionSlot {
    tx: mpsc::UnboundedSender<String>,
    line: LineBuffer,
}

struct ActorState {
    /// `None` until the first operation loads persisted state.
    node: Option<NodeState>,
    history: History,
    sessions: BTreeMap<Uuid, SessionSlot>,
}

impl ActorState {
    fn send(&self, session: Uuid, text: &str) {
        if let Some(slot) = self.sessions.get(&session) {
            let _ = slot.tx.send(text.to_string());
        }
    }

    /// Deliver to every session, each followed by its own prompt and whatever
    /// it had typed so far.
    fn broadcast_with_prompt(&self, text: &str, prompt: &str) {
        for slot in self.sessions.values() {
            let _ = slot
                .tx
                .send(format!("{text}{prompt}{}", slot.line.pending()));
        }
    }

    fn broadcast(&self, text: &str) {
        for slot in self.sessions.values() {
            let _ = slot.tx.send(text.to_string());
        }
    }
}

/// Receiving end of an attached session.
pub struct SessionHandle {
    pub id: Uuid,
    pub output: mpsc::UnboundedReceiver<String>,
}

/// The single owner of one node's config, filesystem, history and sessions.
///
/// Every operation takes the state lock for its whole duration, so commands,
/// config updates and relayed calls on the same node never interleave.
pub struct NodeActor {
    id: ActorId,
    services: Arc<NodeServices>,
    state: Mutex<ActorState>,
}

impl NodeActor {
    pub fn new(id: ActorId, services: Arc<NodeServices>) -> Self {
        let history = History::new(services.settings.history_limit);
        Self {
            id,
            services,
            state: Mutex::new(ActorState {
                node: None,
                history,
                sessions: BTreeMap::new(),
            }),
        }
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    // ── Hydration ──────────────────────────────────────────────

    async fn ensure_hydrated(&self, state: &mut ActorState) -> Result<()> {
        if state.node.is_none() {
            state.node = Some(self.load().await?);
        }
        Ok(())
    }

    async fn load(&self) -> Result<NodeState> {
        let store = &*self.services.store;
        let ns = self.id.as_str();

        let (config, fresh) = match get_json::<ActorConfig>(store, ns, keys::CONFIG)
            .await
            .map_err(storage)?
        {
            Some(config) => (config, false),
            None => (ActorConfig::new_default(self.id.clone()), true),
        };

        let fs = match get_json::<VNode>(store, ns, keys::FS).await.map_err(storage)? {
            Some(root) => FileSystem::from_root(root),
            None => {
                let fs = FileSystem::seeded(&self.id);
                put_json(store, ns, keys::FS, &fs).await.map_err(storage)?;
                fs
            }
        };

        if fresh {
            put_json(store, ns, keys::CONFIG, &config)
                .await
                .map_err(storage)?;
            info!(actor = %self.id, "node created with default config");
        }

        let stats = get_json::<ActorStats>(store, ns, keys::STATS)
            .await
            .map_err(storage)?
            .unwrap_or_default();

        if self.services.settings.auto_register {
            self.auto_register(&config).await;
        }

        debug!(actor = %self.id, entries = fs.len(), "node hydrated");
        Ok(NodeState { config, fs, stats })
    }

    async fn auto_register(&self, config: &ActorConfig) {
        let registry = &self.services.registry;
        let result = match registry.get(&self.id).await {
            Ok(Some(_)) => return,
            Ok(None) => registry
                .upsert(&self.id, &config.display_name, config.persona)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(actor = %self.id, error = %e, "auto-registration failed");
        }
    }

    async fn save_stats(&self, stats: &ActorStats) {
        if let Err(e) = put_json(&*self.services.store, self.id.as_str(), keys::STATS, stats).await
        {
            warn!(actor = %self.id, error = %e, "failed to persist stats");
        }
    }

    // ── Sessions ───────────────────────────────────────────────

    /// Attach a terminal. The boot transcript and the first prompt are
    /// queued on the returned handle.
    pub async fn open_session(&self) -> Result<SessionHandle> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;

        let id = Uuid::new_v4();
        let (tx, output) = mpsc::unbounded_channel();
        state.sessions.insert(
            id,
            SessionSlot {
                tx,
                line: LineBuffer::new(),
            },
        );
        let count = state.sessions.len();

        let ActorState { node, .. } = &mut *state;
        let Some(node) = node.as_mut() else {
            return Err(SynapseError::StorageError("node not hydrated".into()));
        };
        node.stats.sessions_opened += 1;
        self.save_stats(&node.stats).await;

        let boot = Reply::lines(render::boot_transcript(&node.config, count));
        let greeting = format!("{}{}", boot.to_terminal(), render::prompt(&node.config));
        state.send(id, &greeting);

        info!(actor = %self.id, session = %id, sessions = count, "session opened");
        Ok(SessionHandle { id, output })
    }

    /// Feed raw keystrokes from one session.
    pub async fn on_session_data(&self, session: Uuid, chunk: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;

        let events = match state.sessions.get_mut(&session) {
            Some(slot) => slot.line.feed(chunk),
            None => {
                debug!(actor = %self.id, session = %session, "data for unknown session");
                return Ok(());
            }
        };

        for event in events {
            match event {
                TerminalEvent::Echo(text) => state.send(session, &text),
                TerminalEvent::Submit(line) => {
                    state.send(session, NEWLINE);
                    if !line.is_empty() {
                        let reply = self.dispatch(&mut state, &line, Origin::Terminal).await;
                        state.send(session, &reply.to_terminal());
                    }
                    let prompt = match &state.node {
                        Some(node) => render::prompt(&node.config),
                        None => String::new(),
                    };
                    state.send(session, &prompt);
                }
            }
        }
        Ok(())
    }

    pub async fn on_session_close(&self, session: Uuid) {
        let mut state = self.state.lock().await;
        if state.sessions.remove(&session).is_some() {
            info!(actor = %self.id, session = %session, remaining = state.sessions.len(), "session closed");
        }
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    async fn dispatch(&self, state: &mut ActorState, line: &str, origin: Origin<'_>) -> Reply {
        let sessions = state.sessions.len();
        let ActorState { node, history, .. } = state;
        let Some(node) = node.as_mut() else {
            return Reply::error(SynapseError::StorageError("node not hydrated".into()));
        };
        Dispatcher {
            id: &self.id,
            services: &self.services,
            node,
            history,
            sessions,
        }
        .run(line, origin)
        .await
    }

    // ── Config ─────────────────────────────────────────────────

    pub async fn get_config(&self) -> Result<ActorConfig> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;
        state
            .node
            .as_ref()
            .map(|n| n.config.clone())
            .ok_or_else(|| SynapseError::StorageError("node not hydrated".into()))
    }

    /// Validate, persist and apply a partial config update, then tell every
    /// attached session. A failed write leaves the node untouched.
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<ActorConfig> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;
        let Some(node) = state.node.as_mut() else {
            return Err(SynapseError::StorageError("node not hydrated".into()));
        };

        let next = patch.apply(&node.config, Utc::now())?;
        put_json(&*self.services.store, self.id.as_str(), keys::CONFIG, &next)
            .await
            .map_err(storage)?;
        let previous = std::mem::replace(&mut node.config, next.clone());

        if previous.display_name != next.display_name || previous.persona != next.persona {
            if let Err(e) = self
                .services
                .registry
                .upsert(&self.id, &next.display_name, next.persona)
                .await
            {
                warn!(actor = %self.id, error = %e, "registry refresh failed");
            }
        }

        info!(actor = %self.id, persona = %next.persona, status = %next.status, "config updated");
        let notice = format!(
            "{NEWLINE}{}{NEWLINE}",
            render::system_line(&format!(
                "Configuration updated: {} [{}] status {}",
                next.display_name, next.persona, next.status
            ))
        );
        state.broadcast_with_prompt(&notice, &render::prompt(&next));
        Ok(next)
    }

    // ── Relay ──────────────────────────────────────────────────

    /// Run a prompt relayed from another node and return its rendered output.
    /// Attached sessions see the exchange bracketed by relay markers.
    ///
    /// The work runs on its own task: a caller that stops waiting (relay
    /// deadline, dropped HTTP request) does not cut this node off between its
    /// start and end markers.
    pub async fn execute(self: &Arc<Self>, request: ExecuteRequest) -> Result<String> {
        let actor = Arc::clone(self);
        let caller = request.caller_id.clone();
        tokio::spawn(async move { actor.run_relayed(request).await })
            .await
            .map_err(|e| {
                SynapseError::unreachable(self.id.as_str(), format!("request from {caller} aborted: {e}"))
            })?
    }

    async fn run_relayed(&self, request: ExecuteRequest) -> Result<String> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;
        if let Some(node) = state.node.as_mut() {
            node.stats.relays_received += 1;
        }

        info!(actor = %self.id, caller = %request.caller_id, "relayed request");
        state.broadcast(&format!(
            "{NEWLINE}{}{NEWLINE}",
            render::relay_line(&format!(
                "from {}: {}",
                request.caller_id, request.prompt
            ))
        ));

        let origin = Origin::Relay {
            caller: &request.caller_id,
            context: &request.context,
        };
        let reply = self.dispatch(&mut state, &request.prompt, origin).await;

        let prompt = match &state.node {
            Some(node) => render::prompt(&node.config),
            None => String::new(),
        };
        let end = format!(
            "{}{}{NEWLINE}",
            reply.to_terminal(),
            render::relay_line(&format!("end of request from {}", request.caller_id))
        );
        state.broadcast_with_prompt(&end, &prompt);

        Ok(reply.to_relay())
    }

    // ── Introspection ──────────────────────────────────────────

    pub async fn stats(&self) -> Result<ActorStats> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;
        Ok(state
            .node
            .as_ref()
            .map(|n| n.stats)
            .unwrap_or_default())
    }

    pub async fn filesystem(&self) -> Result<FileSystem> {
        let mut state = self.state.lock().await;
        self.ensure_hydrated(&mut state).await?;
        state
            .node
            .as_ref()
            .map(|n| n.fs.clone())
            .ok_or_else(|| SynapseError::StorageError("node not hydrated".into()))
    }
}

fn storage(e: SynapseError) -> SynapseError {
    match e {
        SynapseError::StorageError(_) => e,
        other => SynapseError::StorageError(other.to_string()),
    }
}
