#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use synapse_core::*;
    use synapse_llm::{
        GenerationSettings, LlmProvider, MockProvider, MockResponse, ModelRouter, RoutedGenerator,
    };
    use synapse_mesh::MeshRegistry;
    use synapse_node::terminal::ERASE;
    use synapse_node::*;
    use synapse_store::{KvStore, MemoryKv};

    fn id(raw: &str) -> ActorId {
        ActorId::new(raw).unwrap()
    }

    struct Mesh {
        store: Arc<MemoryKv>,
        dir: Arc<ActorDirectory>,
    }

    fn mesh(mock: Option<Arc<MockProvider>>) -> Mesh {
        mesh_on(Arc::new(MemoryKv::new()), mock)
    }

    fn mesh_on(store: Arc<MemoryKv>, mock: Option<Arc<MockProvider>>) -> Mesh {
        mesh_with(store, mock, NodeSettings::default())
    }

    fn mesh_with(
        store: Arc<MemoryKv>,
        mock: Option<Arc<MockProvider>>,
        settings: NodeSettings,
    ) -> Mesh {
        let kv: Arc<dyn KvStore> = store.clone();
        let registry = Arc::new(MeshRegistry::new(kv.clone()));
        let generator = mock.map(|mock| {
            let mut router = ModelRouter::new();
            router.add_provider(mock as Arc<dyn LlmProvider>);
            Arc::new(RoutedGenerator::new(router, GenerationSettings::default()))
                as Arc<dyn synapse_llm::Generator>
        });
        let dir = ActorDirectory::new(
            kv,
            registry,
            generator,
            settings,
            RelayRoute::Local,
        );
        Mesh { store, dir }
    }

    /// Everything queued on a session so far.
    fn drain(handle: &mut SessionHandle) -> String {
        let mut out = String::new();
        while let Ok(chunk) = handle.output.try_recv() {
            out.push_str(&chunk);
        }
        out
    }

    async fn type_line(actor: &NodeActor, handle: &mut SessionHandle, line: &str) -> String {
        actor
            .on_session_data(handle.id, &format!("{line}\r"))
            .await
            .unwrap();
        drain(handle)
    }

    // ── Sessions and terminal protocol ─────────────────────────

    #[tokio::test]
    async fn test_open_session_sends_boot_transcript_then_prompt() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut session = alice.open_session().await.unwrap();
        let out = drain(&mut session);
        assert!(out.contains("[SYSTEM]"));
        assert!(out.contains("alice"));
        assert!(out.ends_with("alice:/$ "));
        assert_eq!(alice.stats().await.unwrap().sessions_opened, 1);
    }

    #[tokio::test]
    async fn test_mkdir_ls_cd_walkthrough() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        let prompt = render::prompt(&alice.get_config().await.unwrap());
        let out = type_line(&alice, &mut s, "mkdir docs").await;
        assert_eq!(out, format!("mkdir docs\r\ncreated directory docs\r\n{prompt}"));

        let out = type_line(&alice, &mut s, "ls").await;
        assert!(out.contains("logs/\r\n"));
        assert!(out.contains("manifest.json\r\n"));
        assert!(out.contains("docs/\r\n"));

        let out = type_line(&alice, &mut s, "cd docs").await;
        assert!(out.ends_with("alice:/docs$ "));
        assert_eq!(alice.get_config().await.unwrap().cwd, "/docs");

        let out = type_line(&alice, &mut s, "pwd").await;
        assert!(out.contains("/docs\r\n"));

        let out = type_line(&alice, &mut s, "cd").await;
        assert!(out.ends_with("alice:/$ "));
    }

    #[tokio::test]
    async fn test_ls_matches_filesystem_model() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let prompt = render::prompt(&alice.get_config().await.unwrap());

        // (name, is_dir) in insertion order, starting from the seeded tree.
        let mut model: Vec<(String, bool)> =
            vec![("logs".into(), true), ("manifest.json".into(), false)];
        let script = [
            "touch a.txt",
            "mkdir b",
            "mkdir b",
            "touch b",
            "rm ghost",
            "rm logs",
            "touch c",
            "mkdir logs",
            "rm a.txt",
            "touch a.txt",
            "rm b",
            "rm b",
            "mkdir b",
            "touch manifest.json",
            "rm manifest.json",
        ];

        for step in script {
            let (verb, name) = step.split_once(' ').unwrap();
            let exists = model.iter().any(|(n, _)| n == name);
            match verb {
                "mkdir" | "touch" if !exists => model.push((name.to_string(), verb == "mkdir")),
                "rm" => {
                    if let Some(pos) = model.iter().position(|(n, _)| n == name) {
                        model.remove(pos);
                    }
                }
                _ => {}
            }
            type_line(&alice, &mut s, step).await;

            let expected: String = model
                .iter()
                .map(|(n, dir)| if *dir { format!("{n}/\r\n") } else { format!("{n}\r\n") })
                .collect();
            let out = type_line(&alice, &mut s, "ls").await;
            assert_eq!(out, format!("ls\r\n{expected}{prompt}"), "after `{step}`");
        }
        assert_eq!(
            model.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            vec!["c", "logs", "a.txt", "b"]
        );
    }

    #[tokio::test]
    async fn test_echo_redirect_and_cat() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        let out = type_line(&alice, &mut s, "echo \"hello world\" > notes.txt").await;
        assert!(out.contains("wrote 11 bytes to notes.txt\r\n"));
        let out = type_line(&alice, &mut s, "cat notes.txt").await;
        assert!(out.contains("hello world\r\n"));

        type_line(&alice, &mut s, "echo replaced > notes.txt").await;
        let out = type_line(&alice, &mut s, "cat notes.txt").await;
        assert!(out.contains("replaced\r\n"));
        assert!(!out.contains("hello world"));

        let out = type_line(&alice, &mut s, "echo 'just print'").await;
        assert!(out.contains("just print\r\n"));

        let out = type_line(&alice, &mut s, "echo \"a > b\"").await;
        assert!(out.contains("a > b\r\n"));
        assert_eq!(alice.filesystem().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_builtin_errors_render_as_error_lines() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        let out = type_line(&alice, &mut s, "cat missing.txt").await;
        assert!(out.contains("[ERROR] cat: missing.txt: no such file"));

        let out = type_line(&alice, &mut s, "mkdir logs").await;
        assert!(out.contains("[ERROR] mkdir: logs: already exists"));

        let out = type_line(&alice, &mut s, "cat logs").await;
        assert!(out.contains("is a directory"));

        let out = type_line(&alice, &mut s, "rm").await;
        assert!(out.contains("[ERROR] rm: missing name"));
    }

    #[tokio::test]
    async fn test_rm_removes_entry() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "rm logs").await;
        assert!(out.contains("removed logs/\r\n"));
        assert!(!out.contains("[ERROR]"));
        assert_eq!(alice.filesystem().await.unwrap().ls(), vec!["manifest.json"]);
    }

    #[tokio::test]
    async fn test_backspace_edits_the_pending_line() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        alice.on_session_data(s.id, "lx").await.unwrap();
        assert_eq!(drain(&mut s), "lx");
        alice.on_session_data(s.id, "\u{7f}").await.unwrap();
        assert_eq!(drain(&mut s), ERASE);
        alice.on_session_data(s.id, "s\r").await.unwrap();
        let out = drain(&mut s);
        assert!(out.contains("manifest.json"));
    }

    #[tokio::test]
    async fn test_empty_line_only_reprints_prompt() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "   ").await;
        assert!(out.ends_with("alice:/$ "));
        assert!(!out.contains("[ERROR]"));
        assert_eq!(alice.stats().await.unwrap().commands_executed, 0);
    }

    #[tokio::test]
    async fn test_ping_whoami_clear() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        assert!(type_line(&alice, &mut s, "PING").await.contains("PONG\r\n"));
        assert!(type_line(&alice, &mut s, "whoami").await.contains("node-alice (alice)"));
        assert!(type_line(&alice, &mut s, "clear").await.contains("\x1b[2J\x1b[H"));
        assert!(type_line(&alice, &mut s, "help").await.contains("mkdir"));
        assert_eq!(alice.stats().await.unwrap().commands_executed, 4);
    }

    #[tokio::test]
    async fn test_command_output_only_reaches_originating_session() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut a = alice.open_session().await.unwrap();
        let mut b = alice.open_session().await.unwrap();
        drain(&mut a);
        drain(&mut b);

        type_line(&alice, &mut a, "mkdir shared").await;
        assert!(drain(&mut b).is_empty());

        // The filesystem itself is shared.
        let out = type_line(&alice, &mut b, "ls").await;
        assert!(out.contains("shared/"));
        assert_eq!(alice.session_count().await, 2);

        alice.on_session_close(a.id).await;
        assert_eq!(alice.session_count().await, 1);
    }

    // ── Config ─────────────────────────────────────────────────

    #[tokio::test]
    async fn test_default_config_is_persisted_on_first_use() {
        let m = mesh(None);
        let cfg = m.dir.get_or_create(&id("alice")).get_config().await.unwrap();
        assert_eq!(cfg.display_name, "node-alice");
        assert_eq!(cfg.persona, Persona::System);
        assert_eq!(cfg.cwd, "/");
        let stored = m.store.get("alice", "config").await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_persona_update_broadcasts_to_every_session() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut a = alice.open_session().await.unwrap();
        let mut b = alice.open_session().await.unwrap();
        drain(&mut a);
        drain(&mut b);
        alice.on_session_data(b.id, "ec").await.unwrap();
        drain(&mut b);

        let cfg = alice.update_config(ConfigPatch::persona("coder")).await.unwrap();
        assert_eq!(cfg.persona, Persona::Coder);

        let out_a = drain(&mut a);
        assert!(out_a.contains("[SYSTEM]"));
        assert!(out_a.contains("[coder]"));
        assert!(out_a.ends_with("alice:/$ "));
        // Pending input is redrawn after the prompt.
        assert!(drain(&mut b).ends_with("alice:/$ ec"));

        let entry = m.dir.registry().get(&id("alice")).await.unwrap().unwrap();
        assert_eq!(entry.persona, Persona::Coder);
    }

    #[tokio::test]
    async fn test_invalid_persona_is_rejected_without_change() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let err = alice
            .update_config(ConfigPatch::persona("wizard"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynapseError::InvalidConfig(_)));
        assert_eq!(alice.get_config().await.unwrap().persona, Persona::System);
    }

    #[tokio::test]
    async fn test_config_survives_restart() {
        let store = Arc::new(MemoryKv::new());
        {
            let m = mesh_on(store.clone(), None);
            let alice = m.dir.get_or_create(&id("alice"));
            let mut s = alice.open_session().await.unwrap();
            type_line(&alice, &mut s, "mkdir kept").await;
            alice
                .update_config(ConfigPatch::persona("security"))
                .await
                .unwrap();
        }
        let m = mesh_on(store, None);
        let alice = m.dir.get_or_create(&id("alice"));
        assert_eq!(alice.get_config().await.unwrap().persona, Persona::Security);
        assert!(alice.filesystem().await.unwrap().ls().contains(&"kept/".to_string()));
        assert_eq!(alice.stats().await.unwrap().sessions_opened, 1);
    }

    // ── Storage failures ───────────────────────────────────────

    #[tokio::test]
    async fn test_failed_write_rolls_back_filesystem() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        m.store.set_fail_writes(true);
        let out = type_line(&alice, &mut s, "mkdir docs").await;
        assert!(out.contains("[ERROR] storage error"));
        m.store.set_fail_writes(false);

        let ls = alice.filesystem().await.unwrap().ls();
        assert!(!ls.contains(&"docs/".to_string()));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_config() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        alice.get_config().await.unwrap();

        m.store.set_fail_writes(true);
        let err = alice
            .update_config(ConfigPatch::persona("coder"))
            .await
            .unwrap_err();
        assert!(matches!(err, SynapseError::StorageError(_)));
        m.store.set_fail_writes(false);
        assert_eq!(alice.get_config().await.unwrap().persona, Persona::System);
    }

    // ── Relay ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_relay_runs_builtin_on_target() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let bob = m.dir.get_or_create(&id("bob"));
        bob.get_config().await.unwrap();
        let mut bob_session = bob.open_session().await.unwrap();
        drain(&mut bob_session);

        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@bob ping").await;
        assert!(out.contains("response from bob"));
        assert!(out.contains("PONG"));

        let watched = drain(&mut bob_session);
        assert!(watched.contains("[RELAY]"));
        assert!(watched.contains("from alice: ping"));
        assert!(watched.ends_with("bob:/$ "));

        assert_eq!(alice.stats().await.unwrap().relays_sent, 1);
        assert_eq!(bob.stats().await.unwrap().relays_received, 1);
    }

    #[tokio::test]
    async fn test_relay_resolves_display_name() {
        let m = mesh(None);
        let bob = m.dir.get_or_create(&id("bob"));
        bob.update_config(ConfigPatch {
            display_name: Some("Builder".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@builder mkdir from-alice").await;
        assert!(out.contains("response from bob"));
        assert!(bob.filesystem().await.unwrap().ls().contains(&"from-alice/".to_string()));
    }

    #[tokio::test]
    async fn test_relay_to_unknown_node() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@nobody hello").await;
        assert!(out.contains("[ERROR] peer not found: nobody"));
        // No actor was created for the unknown target.
        assert!(m.dir.get(&id("nobody")).is_none());
    }

    #[tokio::test]
    async fn test_relay_to_self_is_refused() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@alice ping").await;
        assert!(out.contains("[ERROR] relay: cannot relay to self"));
    }

    #[tokio::test]
    async fn test_relay_without_message_is_a_syntax_error() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@bob").await;
        assert!(out.contains("[ERROR] relay syntax: @<node> <message>"));
    }

    #[tokio::test]
    async fn test_relayed_prompt_carries_caller_context() {
        let mock = Arc::new(MockProvider::new("mock"));
        let requests = mock.recorded_requests();
        let m = mesh(Some(mock));
        m.dir.get_or_create(&id("bob")).get_config().await.unwrap();

        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@bob summarize the logs").await;
        assert!(out.contains("(mock) summarize the logs"));

        let recorded = requests.lock();
        assert_eq!(recorded.len(), 1);
        let system = recorded[0].system.clone().unwrap_or_default();
        assert!(system.contains("relayed from node 'alice'"));
        assert!(system.contains("manifest.json"));
    }

    #[tokio::test]
    async fn test_timed_out_relay_still_finishes_on_target() {
        let mock = Arc::new(MockProvider::new("mock").with_mock_response(
            MockResponse::text("explained").delayed(Duration::from_millis(400)),
        ));
        let settings = NodeSettings {
            relay_timeout: Duration::from_millis(200),
            generator_timeout: Duration::from_secs(3),
            ..Default::default()
        };
        let m = mesh_with(Arc::new(MemoryKv::new()), Some(mock), settings);

        let bob = m.dir.get_or_create(&id("bob"));
        let mut bob_session = bob.open_session().await.unwrap();
        drain(&mut bob_session);

        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "@bob explain").await;
        assert!(out.contains("[ERROR] peer unreachable: bob: no response within 200ms"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        let watched = drain(&mut bob_session);
        assert!(watched.contains("from alice: explain"));
        assert!(watched.contains("explained"));
        assert!(watched.contains("end of request from alice"));
        assert!(watched.ends_with("bob:/$ "));
    }

    #[tokio::test]
    async fn test_execute_returns_rendered_output() {
        let m = mesh(None);
        let bob = m.dir.get_or_create(&id("bob"));
        let output = bob
            .execute(ExecuteRequest {
                prompt: "ls".into(),
                caller_id: id("alice"),
                context: ExecutionContext::default(),
            })
            .await
            .unwrap();
        assert_eq!(output, "logs/\r\nmanifest.json");
    }

    // ── Fallback generator ─────────────────────────────────────

    #[tokio::test]
    async fn test_generator_directives_run_silently() {
        let mock = Arc::new(
            MockProvider::new("mock")
                .with_response("Setting up. [[mkdir src]] [[touch main.rs]] [[launch rockets]]\nDone."),
        );
        let m = mesh(Some(mock));
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        let out = type_line(&alice, &mut s, "scaffold a project").await;
        assert!(out.contains("[AGENT]"));
        assert!(out.contains("Setting up."));
        assert!(out.contains("Done."));
        assert!(!out.contains("[["));

        let ls = alice.filesystem().await.unwrap().ls();
        assert!(ls.contains(&"src/".to_string()));
        assert!(ls.contains(&"main.rs".to_string()));
    }

    #[tokio::test]
    async fn test_history_feeds_later_prompts() {
        let mock = Arc::new(MockProvider::new("mock"));
        let requests = mock.recorded_requests();
        let m = mesh(Some(mock));
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);

        type_line(&alice, &mut s, "first question").await;
        type_line(&alice, &mut s, "second question").await;

        let recorded = requests.lock();
        assert_eq!(recorded.len(), 2);
        // user, assistant, user
        assert_eq!(recorded[1].turns.len(), 3);
        assert_eq!(recorded[1].turns[0].content, "first question");
    }

    #[tokio::test]
    async fn test_no_generator_reports_unavailable() {
        let m = mesh(None);
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "tell me a story").await;
        assert!(out.contains("[ERROR] generator unavailable"));
        assert!(out.ends_with("alice:/$ "));
    }

    #[tokio::test]
    async fn test_generator_failure_is_an_error_line() {
        let mock = Arc::new(MockProvider::new("mock").with_error("invalid request"));
        let m = mesh(Some(mock));
        let alice = m.dir.get_or_create(&id("alice"));
        let mut s = alice.open_session().await.unwrap();
        drain(&mut s);
        let out = type_line(&alice, &mut s, "hello").await;
        assert!(out.contains("[ERROR] generator failure"));
    }

    // ── Directory ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_directory_returns_same_actor() {
        let m = mesh(None);
        let a = m.dir.get_or_create(&id("alice"));
        let b = m.dir.get_or_create(&id("alice"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(m.dir.len(), 1);
    }

    #[tokio::test]
    async fn test_first_use_registers_node() {
        let m = mesh(None);
        m.dir.get_or_create(&id("alice")).get_config().await.unwrap();
        let nodes = m.dir.registry().list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].display_name, "node-alice");
    }
}
