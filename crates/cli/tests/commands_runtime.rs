use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use epicerie_cli::commands::{catalog, doctor, replay, tools};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn catalog_lists_builtin_products_with_all_category_first() {
    with_env(&[], || {
        let result = catalog::run(None, None);
        assert_eq!(result.exit_code, 0, "expected catalog listing to succeed");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "catalog");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["total"], 30);
        assert_eq!(payload["data"]["categories"][0], "All");
    });
}

#[test]
fn catalog_filters_by_category_and_search() {
    with_env(&[], || {
        let result = catalog::run(Some("Fruits"), Some("apple"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let names = payload["data"]["products"]
            .as_array()
            .expect("products array")
            .iter()
            .map(|product| product["name"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Apples Gala", "Granny Smith Apples"]);
    });
}

#[test]
fn catalog_reports_unreadable_catalog_file() {
    with_env(&[("EPICERIE_CATALOG_PATH", "/nonexistent/epicerie/catalog.json")], || {
        let result = catalog::run(None, None);
        assert_eq!(result.exit_code, 3, "expected catalog load failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "catalog_load");
    });
}

#[test]
fn tools_lists_every_assistant_tool() {
    let result = tools::run();
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let names = payload["data"]
        .as_array()
        .expect("tool list")
        .iter()
        .map(|tool| tool["name"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names.len(), 6);
    assert!(names.contains(&"addToCart".to_string()));
    assert!(names.contains(&"suggestMoreOptions".to_string()));
}

#[test]
fn replay_runs_script_and_scores_checkout() {
    with_env(&[("EPICERIE_SCORING_PERFECT_CART", "1,2")], || {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"[
                {"type": "visit", "surface": "shop"},
                {"type": "tool", "name": "addToCart", "input": {"itemId": 1}},
                {"type": "tool", "name": "addToCart", "input": {"itemId": 2, "quantity": 3}},
                {"type": "tool", "name": "getCartInfo"},
                {"type": "checkout"}
            ]"#,
        )
        .expect("write replay file");

        let result = replay::run(&path);
        assert_eq!(result.exit_code, 0, "expected replay to succeed: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["steps"].as_array().map(Vec::len), Some(5));
        assert_eq!(payload["data"]["checkout"]["score"]["percentage"], 100);
        assert_eq!(payload["data"]["checkout"]["score"]["grade"], "A+");
    });
}

#[test]
fn replay_rejects_malformed_input_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").expect("write replay file");

        let result = replay::run(&path);
        assert_eq!(result.exit_code, 4, "expected replay input failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "replay_input");
        assert!(payload["message"].as_str().unwrap_or_default().contains("could not parse"));
    });
}

#[test]
fn config_failures_surface_as_validation_errors() {
    with_env(&[("EPICERIE_SERVER_PORT", "abc")], || {
        let result = catalog::run(None, None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_reports_passing_checks() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn doctor_json_skips_catalog_checks_on_config_failure() {
    with_env(&[("EPICERIE_SCORING_PERFECT_CART", "0")], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "EPICERIE_CATALOG_PATH",
        "EPICERIE_SCORING_PERFECT_CART",
        "EPICERIE_ASSISTANT_DEFAULT_SHOW_LIMIT",
        "EPICERIE_ASSISTANT_MAX_SUGGESTIONS",
        "EPICERIE_ASSISTANT_MAX_TOOL_STEPS",
        "EPICERIE_SERVER_BIND_ADDRESS",
        "EPICERIE_SERVER_PORT",
        "EPICERIE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "EPICERIE_LOGGING_LEVEL",
        "EPICERIE_LOGGING_FORMAT",
        "EPICERIE_LOG_LEVEL",
        "EPICERIE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
