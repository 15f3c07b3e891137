use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use prodscore_core::config::{AppConfig, LoadOptions};
use toml::Value;

/// Settings shown by `prodscore config`, with the env keys that can override them.
const FIELDS: &[(&str, &[&str])] = &[
    ("database.url", &["PRODSCORE_DATABASE_URL"]),
    ("database.max_connections", &["PRODSCORE_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["PRODSCORE_DATABASE_TIMEOUT_SECS"]),
    ("scoring.batch_size", &["PRODSCORE_SCORING_BATCH_SIZE"]),
    ("scoring.namespace", &["PRODSCORE_SCORING_NAMESPACE"]),
    ("logging.level", &["PRODSCORE_LOGGING_LEVEL", "PRODSCORE_LOG_LEVEL"]),
    ("logging.format", &["PRODSCORE_LOGGING_FORMAT", "PRODSCORE_LOG_FORMAT"]),
];

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_keys) in FIELDS {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &field_value(&config, key), source));
    }

    lines.join("\n")
}

fn field_value(config: &AppConfig, key: &str) -> String {
    match key {
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "scoring.batch_size" => config.scoring.batch_size.to_string(),
        "scoring.namespace" => config.scoring.namespace.clone(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format).to_ascii_lowercase(),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("prodscore.toml"), PathBuf::from("config/prodscore.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
