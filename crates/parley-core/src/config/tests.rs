use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults_when_sections_missing() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.parley.data_dir, "~/.parley");
    assert_eq!(cfg.provider.default, "gemini");
    assert!(cfg.provider.gemini.is_none());
    assert_eq!(cfg.memory.max_context_messages, 20);
    assert!(cfg.responder.allow_list.is_empty());
    assert!(cfg.responder.persist_answered);
    assert_eq!(cfg.responder.reply_signatures.len(), 2);
    assert_eq!(cfg.responder.match_mode, "substring");
}

#[test]
fn test_responder_from_toml() {
    let toml_str = r#"
        [responder]
        allow_list = ["Alice", "You"]
        persist_answered = false
        match_mode = "exact"

        [provider.gemini]
        api_key = "AIza-test"
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.responder.allow_list, vec!["Alice", "You"]);
    assert!(!cfg.responder.persist_answered);
    assert_eq!(cfg.responder.match_mode, "exact");
    let gemini = cfg.provider.gemini.unwrap();
    assert_eq!(gemini.api_key, "AIza-test");
    assert_eq!(gemini.model, "gemini-1.5-flash");
    assert_eq!(gemini.timeout_secs, 60);
    assert!(gemini.enabled);
}

#[test]
fn test_env_overrides_fill_only_empty_values() {
    let env: HashMap<&str, &str> = [
        ("GEMINI_API_KEY", "from-env"),
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
    ]
    .into_iter()
    .collect();
    let lookup = |name: &str| env.get(name).map(|v| v.to_string());

    let mut cfg: Config = toml::from_str("[channel.telegram]\nenabled = true").unwrap();
    cfg.apply_env_overrides(lookup);
    assert_eq!(cfg.provider.gemini.as_ref().unwrap().api_key, "from-env");
    assert_eq!(cfg.channel.telegram.as_ref().unwrap().bot_token, "123:abc");

    let mut cfg: Config = toml::from_str("[provider.gemini]\napi_key = \"from-file\"").unwrap();
    cfg.apply_env_overrides(lookup);
    assert_eq!(cfg.provider.gemini.unwrap().api_key, "from-file");
    assert!(cfg.channel.telegram.is_none());
}

#[test]
fn test_merge_allow_list_file_dedups() {
    let tmp = std::env::temp_dir().join("__parley_test_allow_list__");
    let _ = std::fs::remove_dir_all(&tmp);
    std::fs::create_dir_all(&tmp).unwrap();
    let file = tmp.join("ai-responders.json");
    std::fs::write(&file, r#"{"aiResponders": ["Alice", "Bob"]}"#).unwrap();

    let mut cfg = Config::default();
    cfg.responder.allow_list = vec!["Alice".into()];
    cfg.responder.allow_list_file = Some(file.to_string_lossy().to_string());
    cfg.merge_allow_list_file().unwrap();
    assert_eq!(cfg.responder.allow_list, vec!["Alice", "Bob"]);

    let _ = std::fs::remove_dir_all(&tmp);
}

#[test]
fn test_missing_allow_list_file_is_config_error() {
    let mut cfg = Config::default();
    cfg.responder.allow_list_file = Some("/nonexistent/__parley__/responders.json".into());
    let err = cfg.merge_allow_list_file().unwrap_err();
    assert!(matches!(err, ParleyError::Config(_)));
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__parley__/config.toml").unwrap();
    assert_eq!(cfg.parley.name, "parley");
    assert!(cfg.provider.gemini.is_some());
}

#[test]
fn test_shellexpand_leaves_plain_paths() {
    assert_eq!(shellexpand("/tmp/x.db"), "/tmp/x.db");
    assert_eq!(shellexpand(":memory:"), ":memory:");
}
