//! Profile merging, modelled on a multi-page build where a shared base
//! configuration is merged with one entry per page.

use kiln_config::{ConfigError, KilnConfig, TreeShakingMode};

const MULTI_PAGE: &str = r#"
[bundle.entries]
react = ["react"]

[bundle.output]
filename = "[name].[chunkhash].js"

[bundle.split_chunks]
name = "react"
chunks = "initial"
min_chunks = 2
min_size = 0

[profiles.a.bundle.entries]
a = "./src/pages/a"

[profiles.b.bundle.entries]
b = "./src/pages/b"

[profiles.b.bundle]
tree_shaking = "aggressive"
"#;

#[test]
fn profile_adds_page_entry_after_shared_entry() {
    let config = KilnConfig::from_toml_str(MULTI_PAGE)
        .unwrap()
        .materialize_profile(Some("a"))
        .unwrap();

    let names: Vec<&str> = config.bundle.entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["react", "a"]);
    assert_eq!(config.bundle.split_chunks.name.as_deref(), Some("react"));
    assert_eq!(config.bundle.split_chunks.min_size, 0);
    assert_eq!(config.bundle.tree_shaking, TreeShakingMode::Conservative);
}

#[test]
fn profile_overrides_scalars() {
    let config = KilnConfig::from_toml_str(MULTI_PAGE)
        .unwrap()
        .materialize_profile(Some("b"))
        .unwrap();

    assert!(config.bundle.entries.contains_key("b"));
    assert!(!config.bundle.entries.contains_key("a"));
    assert_eq!(config.bundle.tree_shaking, TreeShakingMode::Aggressive);
}

#[test]
fn no_profile_returns_base() {
    let base = KilnConfig::from_toml_str(MULTI_PAGE).unwrap();
    let same = base.clone().materialize_profile(None).unwrap();
    assert_eq!(base, same);
}

#[test]
fn materialize_all_is_sorted_by_profile_name() {
    let all = KilnConfig::from_toml_str(MULTI_PAGE)
        .unwrap()
        .materialize_all()
        .unwrap();
    let names: Vec<&str> = all.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn invalid_override_type_is_reported() {
    let config = KilnConfig::from_value(serde_json::json!({
        "profiles": {
            "broken": { "bundle": { "max_depth": "deep" } }
        }
    }))
    .unwrap();

    let err = config.materialize_profile(Some("broken")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidProfileOverride { .. }));
}
