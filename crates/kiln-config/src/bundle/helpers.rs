use std::path::PathBuf;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

pub(crate) fn default_filename() -> String {
    "[name].[chunkhash].js".to_string()
}

pub(crate) fn default_manifest() -> String {
    "manifest.json".to_string()
}

pub(crate) fn default_min_size() -> usize {
    30_000
}

pub(crate) fn default_min_chunks() -> usize {
    2
}

pub(crate) fn default_max_depth() -> usize {
    1024
}

pub(crate) fn default_extensions() -> Vec<String> {
    [".js", ".mjs", ".jsx", ".ts", ".tsx", ".json", ".css"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub(crate) fn default_package_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}
