//! Build manifest consumed by the runtime chunk loader.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkKind;

/// Chunk name → artifact, plus entry name → chunk name.
///
/// Maps are ordered so serialization is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Hash over every chunk hash, in chunk order.
    pub hash: String,
    pub chunks: BTreeMap<String, ManifestChunk>,
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    /// Artifact path relative to the output directory.
    pub file: String,
    pub hash: String,
    pub kind: ChunkKind,
    /// Chunks to load before this one executes.
    pub imports: Vec<String>,
    /// Chunks this one may request through `loadChunk`.
    pub dynamic_imports: Vec<String>,
    /// Emitted module keys, in execution order.
    pub modules: Vec<String>,
}

impl Manifest {
    pub fn chunk(&self, name: &str) -> Option<&ManifestChunk> {
        self.chunks.get(name)
    }

    /// Artifact of the chunk serving `entry`.
    pub fn entry_file(&self, entry: &str) -> Option<&str> {
        self.entries
            .get(entry)
            .and_then(|chunk| self.chunks.get(chunk))
            .map(|chunk| chunk.file.as_str())
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keys_are_sorted() {
        let mut manifest = Manifest {
            hash: "abc".into(),
            ..Manifest::default()
        };
        for name in ["zeta", "alpha"] {
            manifest.chunks.insert(
                name.to_string(),
                ManifestChunk {
                    file: format!("{name}.js"),
                    hash: "h".into(),
                    kind: ChunkKind::Entry,
                    imports: Vec::new(),
                    dynamic_imports: Vec::new(),
                    modules: Vec::new(),
                },
            );
            manifest.entries.insert(name.to_string(), name.to_string());
        }

        let json = manifest.to_json().unwrap();
        let alpha = json.find("\"alpha\"").unwrap();
        let zeta = json.find("\"zeta\"").unwrap();
        assert!(alpha < zeta);
        assert!(json.contains("\"kind\": \"entry\""));
        assert_eq!(manifest.entry_file("zeta"), Some("zeta.js"));
        assert_eq!(Manifest::from_json(&json).unwrap(), manifest);
    }
}
