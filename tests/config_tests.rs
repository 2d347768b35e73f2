use std::path::PathBuf;

use graphimport::{ConfigError, ConfigOverrides, ImportConfig, NodePolicy};
use tempfile::TempDir;

#[test]
fn defaults_match_documented_values() {
    let config = ImportConfig::default();
    assert_eq!(config.database, PathBuf::from("graph.db"));
    assert_eq!(config.report, PathBuf::from("log_unknown_relations.txt"));
    assert_eq!(config.node_policy, NodePolicy::CreateOnly);
    assert_eq!(config.prefetch, 4);
    assert!(!config.fail_fast);
    assert!(config.fragments.is_none());
    assert!(config.sqlite.pragmas.is_empty());
}

#[test]
fn parses_full_file() {
    let config = ImportConfig::from_toml_str(
        r#"
        database = "out/research.db"
        fragments = "fragments"
        node_policy = "find-or-update"
        report = "unresolved.txt"
        fail_fast = true
        prefetch = 2

        [sqlite]
        cache_size = 256
        pragmas = { journal_mode = "WAL", synchronous = "NORMAL" }
        "#,
    )
    .expect("config");
    assert_eq!(config.database, PathBuf::from("out/research.db"));
    assert_eq!(config.fragments, Some(PathBuf::from("fragments")));
    assert_eq!(config.node_policy, NodePolicy::FindOrUpdate);
    assert_eq!(config.report, PathBuf::from("unresolved.txt"));
    assert!(config.fail_fast);
    assert_eq!(config.prefetch, 2);
    assert_eq!(config.sqlite.cache_size, Some(256));
    assert_eq!(
        config.sqlite.pragmas.get("journal_mode").map(String::as_str),
        Some("WAL")
    );
}

#[test]
fn partial_file_keeps_defaults() {
    let config = ImportConfig::from_toml_str("fail_fast = true").expect("config");
    assert!(config.fail_fast);
    assert_eq!(config.database, PathBuf::from("graph.db"));
    assert_eq!(config.prefetch, 4);
}

#[test]
fn rejects_unknown_keys_and_bad_values() {
    assert!(matches!(
        ImportConfig::from_toml_str("databse = \"x.db\""),
        Err(ConfigError::Parse { .. })
    ));
    assert!(matches!(
        ImportConfig::from_toml_str("node_policy = \"merge\""),
        Err(ConfigError::Parse { .. })
    ));
    assert!(matches!(
        ImportConfig::from_toml_str("prefetch = 0"),
        Err(ConfigError::Invalid {
            field: "prefetch",
            ..
        })
    ));
}

#[test]
fn explicit_file_must_exist() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    assert!(matches!(
        ImportConfig::load(Some(missing.as_path())),
        Err(ConfigError::Read { .. })
    ));

    let present = dir.path().join("import.toml");
    std::fs::write(&present, "database = \"from-file.db\"\n").expect("write");
    let config = ImportConfig::load(Some(present.as_path())).expect("load");
    assert_eq!(config.database, PathBuf::from("from-file.db"));
}

#[test]
fn command_line_overrides_file() {
    let mut config = ImportConfig::from_toml_str(
        r#"
        database = "file.db"
        report = "file-report.txt"
        node_policy = "find-or-update"
        "#,
    )
    .expect("config");
    config.apply(ConfigOverrides {
        database: Some(PathBuf::from("cli.db")),
        node_policy: Some(NodePolicy::CreateOnly),
        fail_fast: true,
        ..ConfigOverrides::default()
    });
    assert_eq!(config.database, PathBuf::from("cli.db"));
    assert_eq!(config.node_policy, NodePolicy::CreateOnly);
    assert_eq!(config.report, PathBuf::from("file-report.txt"));
    assert!(config.fail_fast);
}
