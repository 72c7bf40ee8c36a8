use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use shutterbook_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: 2,
                output: format!("config validation failed: {error}"),
            };
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let api_key = config
        .gateway
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let catalog_path = config
        .booking
        .catalog_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());

    let entries = [
        (
            "gateway.endpoint",
            config.gateway.endpoint.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["SHUTTERBOOK_GATEWAY_ENDPOINT"][..],
        ),
        ("gateway.api_key", api_key, &["SHUTTERBOOK_GATEWAY_API_KEY"][..]),
        (
            "gateway.timeout_secs",
            config.gateway.timeout_secs.to_string(),
            &["SHUTTERBOOK_GATEWAY_TIMEOUT_SECS"][..],
        ),
        (
            "gateway.encoding",
            config.gateway.encoding.as_str().to_string(),
            &["SHUTTERBOOK_GATEWAY_ENCODING"][..],
        ),
        (
            "booking.require_size",
            config.booking.require_size.to_string(),
            &["SHUTTERBOOK_BOOKING_REQUIRE_SIZE"][..],
        ),
        (
            "booking.notes_placeholder",
            config.booking.notes_placeholder.clone(),
            &["SHUTTERBOOK_BOOKING_NOTES_PLACEHOLDER"][..],
        ),
        ("booking.catalog_path", catalog_path, &["SHUTTERBOOK_BOOKING_CATALOG_PATH"][..]),
        (
            "booking.currency",
            config.booking.currency.clone(),
            &["SHUTTERBOOK_BOOKING_CURRENCY"][..],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["SHUTTERBOOK_LOGGING_LEVEL", "SHUTTERBOOK_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["SHUTTERBOOK_LOGGING_FORMAT", "SHUTTERBOOK_LOG_FORMAT"][..],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .iter()
            .map(|&(key, ref value, env_keys)| render_line(key, value, source(key, env_keys))),
    );

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    ["shutterbook.toml", "config/shutterbook.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
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

/// Keeps the first four characters of long keys so operators can tell keys apart.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() > 12 {
        let prefix: String = trimmed.chars().take(4).collect();
        return format!("{prefix}***");
    }
    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_key};

    #[test]
    fn keys_are_never_printed_in_full() {
        assert_eq!(redact_key("sheet-secret-value"), "shee***");
        assert_eq!(redact_key("short"), "<redacted>");
        assert_eq!(redact_key("   "), "<empty>");
    }

    #[test]
    fn dotted_paths_resolve_inside_tables() {
        let doc: Value = "[gateway]\nendpoint = \"https://x.example.com\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "gateway.endpoint"));
        assert!(!contains_path(&doc, "gateway.api_key"));
        assert!(!contains_path(&doc, "booking.currency"));
    }
}
