//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "parley".to_string()
}

pub fn default_data_dir() -> String {
    "~/.parley".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_provider() -> String {
    "gemini".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

pub fn default_timeout_secs() -> u64 {
    60
}

pub fn default_memory_backend() -> String {
    "sqlite".to_string()
}

pub fn default_db_path() -> String {
    "~/.parley/data/parley.db".to_string()
}

pub fn default_max_context() -> usize {
    20
}

pub fn default_reply_signatures() -> Vec<String> {
    vec![
        "\u{1f916}".to_string(),
        "Sorry, I'm having trouble".to_string(),
    ]
}

pub fn default_match_mode() -> String {
    "substring".to_string()
}

pub fn default_persona() -> String {
    crate::prompt::DEFAULT_PERSONA.to_string()
}
