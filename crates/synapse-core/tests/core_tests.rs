#[cfg(test)]
mod tests {
    use chrono::Utc;
    use synapse_core::*;

    fn alice() -> ActorId {
        ActorId::new("alice").unwrap()
    }

    // ── ActorId tests ──────────────────────────────────────────

    #[test]
    fn test_actor_id_accepts_simple_names() {
        for raw in ["alice", "node-1", "sec_bot.v2", "A"] {
            assert!(ActorId::new(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn test_actor_id_rejects_bad_input() {
        let too_long = "x".repeat(MAX_ACTOR_ID_LEN + 1);
        for raw in ["", "has space", "slash/y", "ünïcode", too_long.as_str()] {
            let err = ActorId::new(raw).unwrap_err();
            assert!(matches!(err, SynapseError::InvalidConfig(_)), "{raw}");
        }
    }

    #[test]
    fn test_actor_id_serde_is_validated() {
        let id: ActorId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(id.as_str(), "bob");
        assert!(serde_json::from_str::<ActorId>("\"bad id\"").is_err());
    }

    // ── ActorConfig tests ──────────────────────────────────────

    #[test]
    fn test_default_config() {
        let cfg = ActorConfig::new_default(alice());
        assert_eq!(cfg.display_name, "node-alice");
        assert_eq!(cfg.persona, Persona::System);
        assert_eq!(cfg.status, NodeStatus::Online);
        assert_eq!(cfg.cwd, "/");
        assert_eq!(cfg.system_prompt, Persona::System.default_system_prompt());
    }

    #[test]
    fn test_config_serializes_camel_case() {
        let cfg = ActorConfig::new_default(alice());
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["displayName"], "node-alice");
        assert_eq!(json["persona"], "system");
        assert_eq!(json["status"], "online");
        assert!(json.get("lastActive").is_some());
        assert!(json.get("systemPrompt").is_some());
    }

    // ── ConfigPatch tests ──────────────────────────────────────

    #[test]
    fn test_patch_sets_persona_and_stamps_last_active() {
        let cfg = ActorConfig::new_default(alice());
        let later = cfg.last_active + chrono::Duration::seconds(5);
        let next = ConfigPatch::persona("coder").apply(&cfg, later).unwrap();
        assert_eq!(next.persona, Persona::Coder);
        assert_eq!(next.last_active, later);
        assert_eq!(next.display_name, cfg.display_name);
    }

    #[test]
    fn test_patch_rejects_unknown_persona_without_touching_current() {
        let cfg = ActorConfig::new_default(alice());
        let before = cfg.clone();
        let err = ConfigPatch::persona("wizard").apply(&cfg, Utc::now()).unwrap_err();
        assert!(matches!(err, SynapseError::InvalidConfig(_)));
        assert_eq!(cfg, before);
    }

    #[test]
    fn test_patch_rejects_relative_cwd() {
        let cfg = ActorConfig::new_default(alice());
        let err = ConfigPatch::cwd("docs").apply(&cfg, Utc::now()).unwrap_err();
        assert!(matches!(err, SynapseError::InvalidConfig(_)));
    }

    #[test]
    fn test_patch_normalizes_cwd() {
        let cfg = ActorConfig::new_default(alice());
        let next = ConfigPatch::cwd("/a/./b/../c").apply(&cfg, Utc::now()).unwrap();
        assert_eq!(next.cwd, "/a/c");
    }

    #[test]
    fn test_patch_accepts_aliases() {
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"name":"Alice","agentType":"security"}"#).unwrap();
        assert_eq!(patch.display_name.as_deref(), Some("Alice"));
        assert_eq!(patch.persona.as_deref(), Some("security"));
    }

    #[test]
    fn test_patch_rejects_unknown_status() {
        let cfg = ActorConfig::new_default(alice());
        let patch = ConfigPatch {
            status: Some("asleep".into()),
            ..Default::default()
        };
        assert!(patch.apply(&cfg, Utc::now()).is_err());
    }

    // ── Registry types ─────────────────────────────────────────

    #[test]
    fn test_register_request_defaults() {
        let req = RegisterRequest {
            id: "bob".into(),
            display_name: None,
            persona: None,
        };
        let entry = req.into_entry(Utc::now()).unwrap();
        assert_eq!(entry.display_name, "node-bob");
        assert_eq!(entry.persona, Persona::System);
    }

    #[test]
    fn test_register_request_rejects_bad_persona() {
        let req = RegisterRequest {
            id: "bob".into(),
            display_name: Some("Bob".into()),
            persona: Some("pirate".into()),
        };
        assert!(req.into_entry(Utc::now()).is_err());
    }

    // ── Execute request ────────────────────────────────────────

    #[test]
    fn test_execute_request_wire_shape() {
        let raw = r#"{"prompt":"ls","callerId":"alice","context":{"cwd":"/","fsSummary":["logs/"],"history":[{"role":"user","content":"hi"}]}}"#;
        let req: ExecuteRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(req.caller_id, alice());
        assert_eq!(req.context.fs_summary, vec!["logs/".to_string()]);
        assert_eq!(req.context.history[0].role, Role::User);
    }

    #[test]
    fn test_execute_request_context_optional() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"prompt":"ls","callerId":"alice"}"#).unwrap();
        assert!(req.context.history.is_empty());
    }

    // ── History ────────────────────────────────────────────────

    #[test]
    fn test_history_keeps_most_recent() {
        let mut history = History::new(3);
        for i in 0..5 {
            history.push(ConversationTurn::user(format!("m{i}")));
        }
        assert_eq!(history.len(), 3);
        let recent = history.recent(2);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(recent[1].content, "m4");
    }

    // ── Envelope ───────────────────────────────────────────────

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 42);
        assert!(ok.get("error").is_none());

        let err = serde_json::to_value(ApiResponse::<()>::err("boom")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "boom");
        assert!(err.get("data").is_none());
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_kinds() {
        assert_eq!(SynapseError::PeerNotFound("x".into()).kind(), "PeerNotFound");
        assert_eq!(SynapseError::unreachable("x", "timeout").kind(), "PeerUnreachable");
        assert_eq!(SynapseError::usage("mkdir", "missing name").to_string(), "mkdir: missing name");
    }
}
