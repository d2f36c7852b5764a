// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Loads the static tool-metadata descriptor bundled with the agent install,
//! ahead of component C seeding it into the bus.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to read tool metadata file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse tool metadata file {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ToolMetadata {
    pub entries: BTreeMap<String, serde_json::Value>,
}

impl ToolMetadata {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| MetadataError::Read(path.to_path_buf(), source))?;
        let entries = serde_json::from_str(&content)
            .map_err(|source| MetadataError::Parse(path.to_path_buf(), source))?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_well_formed_descriptor() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool-scripts.json");
        std::fs::write(&path, r#"{"mpstat": {"kind": "sysstat"}}"#).unwrap();

        let metadata = ToolMetadata::load(&path).unwrap();
        assert!(metadata.entries.contains_key("mpstat"));
    }

    #[test]
    fn malformed_descriptor_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool-scripts.json");
        std::fs::write(&path, "not json").unwrap();

        let err = ToolMetadata::load(&path).unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_, _)));
    }
}
