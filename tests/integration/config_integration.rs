//! Integration tests for layered configuration loading

use crate::integration::test_utils::with_isolated_env;
use docket::access::ReviewerRole;
use docket::config::{global_config_path, ConfigLoader};
use docket::types::ScopeKey;
use std::fs;

fn write_workspace_file(root: &std::path::Path, name: &str, contents: &str) {
    let dir = root.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_defaults_without_any_files() {
    with_isolated_env(&[], |temp_dir| {
        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        assert_eq!(config.store.base_url, "http://localhost:8080/admin");
        assert_eq!(config.refresh.interval_secs, 30);
        assert_eq!(config.refresh.max_retries, 3);
        assert_eq!(config.refresh.base_delay_ms, 1000);
        assert!(config.refresh.refresh_after_dispatch);
        assert!(config.reviewer.is_none());
        assert!(config.validate().is_ok());
    });
}

#[test]
fn test_workspace_file_and_environment_overlay() {
    with_isolated_env(&[("DOCKET_ENV", "staging")], |temp_dir| {
        let root = temp_dir.path().join("workspace");
        write_workspace_file(
            &root,
            "config.toml",
            r#"
[store]
base_url = "https://admin.example.com/api"
timeout_ms = 5000

[refresh]
interval_secs = 15

[reviewer]
id = "staff-7"
role = "scoped"
scopes = ["support", "lawyers"]
"#,
        );
        write_workspace_file(
            &root,
            "staging.toml",
            r#"
[refresh]
interval_secs = 60
"#,
        );
        write_workspace_file(
            &root,
            "production.toml",
            r#"
[refresh]
interval_secs = 5
"#,
        );

        let config = ConfigLoader::load(&root).unwrap();
        assert_eq!(config.store.base_url, "https://admin.example.com/api");
        assert_eq!(config.store.timeout_ms, 5000);
        assert_eq!(config.refresh.interval_secs, 60);
        assert_eq!(config.refresh.max_retries, 3);

        let reviewer = config.reviewer.expect("reviewer configured").identity();
        assert_eq!(reviewer.id, "staff-7");
        assert_eq!(reviewer.role, ReviewerRole::Scoped);
        assert!(reviewer.scopes.contains(&ScopeKey::new("lawyers")));
        assert!(!reviewer.scopes.contains(&ScopeKey::new("accountDeletion")));
    });
}

#[test]
fn test_environment_overrides_files() {
    with_isolated_env(
        &[
            ("DOCKET_STORE__BASE_URL", "https://env.example.com"),
            ("DOCKET_REFRESH__MAX_RETRIES", "5"),
        ],
        |temp_dir| {
            write_workspace_file(
                temp_dir.path(),
                "config.toml",
                "[store]\nbase_url = \"https://file.example.com\"\n",
            );
            let config = ConfigLoader::load(temp_dir.path()).unwrap();
            assert_eq!(config.store.base_url, "https://env.example.com");
            assert_eq!(config.refresh.max_retries, 5);
        },
    );
}

#[test]
fn test_global_file_sits_below_workspace() {
    with_isolated_env(&[], |temp_dir| {
        let global = global_config_path().expect("home directory resolvable");
        assert!(global.starts_with(temp_dir.path()));
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(
            &global,
            "[store]\napi_token = \"global-token\"\nbase_url = \"https://global.example.com\"\n",
        )
        .unwrap();

        let root = temp_dir.path().join("workspace");
        write_workspace_file(
            &root,
            "config.toml",
            "[store]\nbase_url = \"https://workspace.example.com\"\n",
        );

        let config = ConfigLoader::load(&root).unwrap();
        assert_eq!(config.store.base_url, "https://workspace.example.com");
        assert_eq!(config.store.api_token.as_deref(), Some("global-token"));
    });
}

#[test]
fn test_invalid_values_are_all_reported() {
    with_isolated_env(&[], |temp_dir| {
        write_workspace_file(
            temp_dir.path(),
            "config.toml",
            r#"
[store]
base_url = "ftp://files.example.com"

[refresh]
interval_secs = 0

[reviewer]
id = " "
"#,
        );
        let config = ConfigLoader::load(temp_dir.path()).unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);

        let message = config.ensure_valid().unwrap_err().to_string();
        assert!(message.contains("Store"));
        assert!(message.contains("Refresh"));
        assert!(message.contains("Reviewer"));
    });
}
