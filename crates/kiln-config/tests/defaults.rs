//! Tests for default values and edge cases.

use std::path::PathBuf;

use kiln_config::{
    BundleOptions, ChunkScope, EntrySpec, GlobalSettings, KilnConfig, OutputOptions,
    SplitChunksOptions, TreeShakingMode,
};

#[test]
fn kiln_config_defaults() {
    let config = KilnConfig::default();
    assert!(config.bundle.entries.is_empty());
    assert!(config.profiles.is_empty());
    assert_eq!(config.settings, GlobalSettings::default());
}

#[test]
fn bundle_options_defaults() {
    let opts = BundleOptions::default();
    assert!(opts.entries.is_empty());
    assert_eq!(opts.tree_shaking, TreeShakingMode::Conservative);
    assert_eq!(opts.max_depth, 1024);
    assert!(opts.cwd.is_none());
    assert_eq!(
        opts.resolve.extensions,
        vec![".js", ".mjs", ".jsx", ".ts", ".tsx", ".json", ".css"]
    );
    assert_eq!(opts.resolve.package_roots, vec![PathBuf::from("node_modules")]);
}

#[test]
fn output_defaults() {
    let output = OutputOptions::default();
    assert_eq!(output.dir, PathBuf::from("dist"));
    assert_eq!(output.filename, "[name].[chunkhash].js");
    assert_eq!(output.chunk_filename, "[name].[chunkhash].js");
    assert_eq!(output.manifest, "manifest.json");
    assert!(output.overwrite);
}

#[test]
fn split_chunks_defaults() {
    let split = SplitChunksOptions::default();
    assert!(split.name.is_none());
    assert_eq!(split.chunks, ChunkScope::All);
    assert_eq!(split.min_size, 30_000);
    assert_eq!(split.min_chunks, 2);
    assert!(split.groups.is_empty());
    assert_eq!(split.cache_groups().len(), 1);
}

#[test]
fn empty_json_object_uses_defaults() {
    let config = KilnConfig::from_value(serde_json::json!({})).unwrap();
    assert_eq!(config, KilnConfig::default());
}

#[test]
fn entry_accepts_string_or_list() {
    let config = KilnConfig::from_value(serde_json::json!({
        "bundle": {
            "entries": {
                "react": ["react", "react-dom"],
                "a": "./src/pages/a"
            }
        }
    }))
    .unwrap();

    assert_eq!(
        config.bundle.entries["react"],
        EntrySpec::Multiple(vec!["react".to_string(), "react-dom".to_string()])
    );
    let specifiers: Vec<(&str, Vec<&str>)> = config.bundle.entry_specifiers().collect();
    assert_eq!(
        specifiers,
        vec![
            ("react", vec!["react", "react-dom"]),
            ("a", vec!["./src/pages/a"]),
        ]
    );
}

#[test]
fn chunk_scope_membership() {
    assert!(ChunkScope::Initial.includes(true));
    assert!(!ChunkScope::Initial.includes(false));
    assert!(ChunkScope::Async.includes(false));
    assert!(!ChunkScope::Async.includes(true));
    assert!(ChunkScope::All.includes(true) && ChunkScope::All.includes(false));
}

#[test]
fn unknown_tree_shaking_mode_is_rejected() {
    let result = KilnConfig::from_value(serde_json::json!({
        "bundle": { "tree_shaking": "reckless" }
    }));
    assert!(result.is_err());
}
