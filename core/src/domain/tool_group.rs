// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Parses a `tools-v1-<group>` directory tree into an in-memory [`ToolGroup`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A tool group resolved from `<pbench_run>/tools-v1-<group>`.
///
/// `hostnames` records every host directory seen, independent of whether
/// that host carries any tool files; `toolnames` records, for every tool
/// seen on any host, the per-host options-string for that tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGroup {
    name: String,
    trigger: Option<String>,
    hostnames: BTreeSet<String>,
    labels: BTreeMap<String, String>,
    toolnames: BTreeMap<String, BTreeMap<String, String>>,
}

/// A derivable, per-host view over a [`ToolGroup`]'s `toolnames` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDescriptor {
    pub tools: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolGroupError {
    #[error("tool group directory does not exist or is not a directory: {0}")]
    BadGroup(PathBuf),
    #[error("symlink cycle while resolving tool group directory: {0}")]
    SymlinkCycle(PathBuf),
    #[error("failed to resolve tool group directory {0}: {1}")]
    Resolve(PathBuf, #[source] std::io::Error),
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> Option<&str> {
        self.trigger.as_deref()
    }

    pub fn hostnames(&self) -> &BTreeSet<String> {
        &self.hostnames
    }

    pub fn label(&self, host: &str) -> Option<&str> {
        self.labels.get(host).map(String::as_str)
    }

    pub fn host_descriptor(&self, host: &str) -> HostDescriptor {
        let mut tools = BTreeMap::new();
        for (tool, hosts) in &self.toolnames {
            if let Some(options) = hosts.get(host) {
                tools.insert(tool.clone(), options.clone());
            }
        }
        HostDescriptor { tools }
    }
}

pub struct ToolGroupLoader;

const TRIGGER_FILE: &str = "__trigger__";
const LABEL_FILE: &str = "__label__";
const NOINSTALL_SUFFIX: &str = "__noinstall__";

impl ToolGroupLoader {
    /// Loads the tool group named `group` from `<pbench_run>/tools-v1-<group>`.
    pub fn load(group: &str, root: &Path) -> Result<ToolGroup, ToolGroupError> {
        let resolved = resolve_root(root)?;
        if !resolved.is_dir() {
            return Err(ToolGroupError::BadGroup(root.to_path_buf()));
        }

        let mut trigger = None;
        let mut hostnames = BTreeSet::new();
        let mut labels = BTreeMap::new();
        let mut toolnames: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

        for entry in read_dir_sorted(&resolved)? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            if file_name == TRIGGER_FILE {
                let content = read_to_string(&path)?;
                trigger = parse_trigger(content);
                continue;
            }

            let file_type = entry.file_type().map_err(|source| ToolGroupError::Io {
                path: path.clone(),
                source,
            })?;
            if !file_type.is_dir() {
                tracing::warn!(path = %path.display(), "skipping non-directory entry in tool group");
                continue;
            }

            hostnames.insert(file_name.clone());
            load_host(&path, &file_name, &mut labels, &mut toolnames)?;
        }

        Ok(ToolGroup {
            name: group.to_string(),
            trigger,
            hostnames,
            labels,
            toolnames,
        })
    }
}

fn load_host(
    host_dir: &Path,
    host: &str,
    labels: &mut BTreeMap<String, String>,
    toolnames: &mut BTreeMap<String, BTreeMap<String, String>>,
) -> Result<(), ToolGroupError> {
    for entry in read_dir_sorted(host_dir)? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        if file_name == LABEL_FILE {
            let content = read_to_string(&path)?;
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                labels.insert(host.to_string(), trimmed.to_string());
            }
            continue;
        }

        if file_name.ends_with(NOINSTALL_SUFFIX) {
            continue;
        }

        let file_type = entry.file_type().map_err(|source| ToolGroupError::Io {
            path: path.clone(),
            source,
        })?;
        if !file_type.is_file() {
            tracing::warn!(path = %path.display(), "skipping non-file tool entry");
            continue;
        }

        let content = read_to_string(&path)?;
        let options = parse_options(&content);
        toolnames
            .entry(file_name)
            .or_default()
            .insert(host.to_string(), options);
    }
    Ok(())
}

fn parse_trigger(content: String) -> Option<String> {
    if content.trim_end_matches('\n').is_empty() {
        None
    } else {
        Some(content)
    }
}

fn parse_options(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_root(path: &Path) -> Result<PathBuf, ToolGroupError> {
    match std::fs::canonicalize(path) {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.raw_os_error() == Some(libc::ELOOP) => {
            Err(ToolGroupError::SymlinkCycle(path.to_path_buf()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ToolGroupError::BadGroup(path.to_path_buf()))
        }
        Err(e) => Err(ToolGroupError::Resolve(path.to_path_buf(), e)),
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<std::fs::DirEntry>, ToolGroupError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ToolGroupError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .collect::<Result<_, _>>()
        .map_err(|source| ToolGroupError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn read_to_string(path: &Path) -> Result<String, ToolGroupError> {
    std::fs::read_to_string(path).map_err(|source| ToolGroupError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn empty_and_absent_trigger_produce_identical_output() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        fs::create_dir_all(&root).unwrap();
        write(&root.join(TRIGGER_FILE), "\n");

        let with_empty = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(with_empty.trigger(), None);

        fs::remove_file(root.join(TRIGGER_FILE)).unwrap();
        let without = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(without.trigger(), None);
    }

    #[test]
    fn trigger_is_stored_verbatim_when_non_empty() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        fs::create_dir_all(&root).unwrap();
        write(&root.join(TRIGGER_FILE), "start:foo\nstop:bar\n");

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(group.trigger(), Some("start:foo\nstop:bar\n"));
    }

    #[test]
    fn host_with_zero_tools_is_still_recorded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        fs::create_dir_all(root.join("hostA")).unwrap();

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert!(group.hostnames().contains("hostA"));
        assert!(group.host_descriptor("hostA").tools.is_empty());
    }

    #[test]
    fn options_string_joins_non_blank_trimmed_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        write(&root.join("hostA").join("mpstat"), "  --interval=3  \n\n  --cpu-list=0-3\n");

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(
            group.host_descriptor("hostA").tools.get("mpstat").unwrap(),
            "--interval=3 --cpu-list=0-3"
        );
    }

    #[test]
    fn noinstall_suffixed_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        write(&root.join("hostA").join("mpstat__noinstall__"), "--interval=3\n");

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert!(group.host_descriptor("hostA").tools.is_empty());
    }

    #[test]
    fn label_file_is_trimmed_and_recorded() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        write(&root.join("hostA").join(LABEL_FILE), "  webtier  \n");

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(group.label("hostA"), Some("webtier"));
    }

    #[test]
    fn missing_group_directory_is_bad_group() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-nonexistent");
        let err = ToolGroupLoader::load("nonexistent", &root).unwrap_err();
        assert!(matches!(err, ToolGroupError::BadGroup(_)));
    }

    #[test]
    fn non_directory_top_level_entry_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tools-v1-default");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("stray-file"), "oops").unwrap();
        fs::create_dir_all(root.join("hostA")).unwrap();

        let group = ToolGroupLoader::load("default", &root).unwrap();
        assert_eq!(group.hostnames().len(), 1);
        assert!(group.hostnames().contains("hostA"));
    }
}
