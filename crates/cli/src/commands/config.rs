use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use epicerie_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    render(&config, resolve_config_path(None).as_deref())
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let catalog_path = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<builtin>".to_string());
    let perfect_cart = config
        .scoring
        .perfect_cart
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        render_line("catalog.path", &catalog_path, source("catalog.path", &["EPICERIE_CATALOG_PATH"])),
        render_line(
            "scoring.perfect_cart",
            &format!("[{perfect_cart}]"),
            source("scoring.perfect_cart", &["EPICERIE_SCORING_PERFECT_CART"]),
        ),
        render_line(
            "assistant.default_show_limit",
            &config.assistant.default_show_limit.to_string(),
            source("assistant.default_show_limit", &["EPICERIE_ASSISTANT_DEFAULT_SHOW_LIMIT"]),
        ),
        render_line(
            "assistant.max_suggestions",
            &config.assistant.max_suggestions.to_string(),
            source("assistant.max_suggestions", &["EPICERIE_ASSISTANT_MAX_SUGGESTIONS"]),
        ),
        render_line(
            "assistant.max_tool_steps",
            &config.assistant.max_tool_steps.to_string(),
            source("assistant.max_tool_steps", &["EPICERIE_ASSISTANT_MAX_TOOL_STEPS"]),
        ),
        render_line(
            "server.bind_address",
            &config.server.bind_address,
            source("server.bind_address", &["EPICERIE_SERVER_BIND_ADDRESS"]),
        ),
        render_line(
            "server.port",
            &config.server.port.to_string(),
            source("server.port", &["EPICERIE_SERVER_PORT"]),
        ),
        render_line(
            "server.graceful_shutdown_secs",
            &config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", &["EPICERIE_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
        ),
        render_line(
            "logging.level",
            &config.logging.level,
            source("logging.level", &["EPICERIE_LOGGING_LEVEL", "EPICERIE_LOG_LEVEL"]),
        ),
        render_line(
            "logging.format",
            &format!("{:?}", config.logging.format),
            source("logging.format", &["EPICERIE_LOGGING_FORMAT", "EPICERIE_LOG_FORMAT"]),
        ),
    ];

    lines.join("\n")
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
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
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

#[cfg(test)]
mod tests {
    use std::fs;

    use epicerie_core::config::AppConfig;
    use tempfile::TempDir;

    use super::render;

    #[test]
    fn defaults_are_attributed_to_default_source() {
        let output = render(&AppConfig::default(), None);
        assert!(output.contains("- catalog.path = <builtin> (source: default)"));
        assert!(output.contains("- scoring.perfect_cart = [1,2,3,4,5,6,7] (source: default)"));
    }

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("epicerie.toml");
        fs::write(&path, "[assistant]\nmax_tool_steps = 8\n").expect("write config");

        let mut config = AppConfig::default();
        config.assistant.max_tool_steps = 8;
        let output = render(&config, Some(&path));

        assert!(output.contains(&format!(
            "- assistant.max_tool_steps = 8 (source: file ({}))",
            path.display()
        )));
        assert!(output.contains("- assistant.max_suggestions = 3 (source: default)"));
    }
}
