// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Seeds the bus with tool metadata and per-agent parameter records
//! (component C), ahead of the agent spawn fan-out.

use crate::bus::{BusClient, BusWireConfig};
use crate::config::CoordinatorConfig;
use crate::domain::{meister_key, sink_key, MeisterParams, SinkParams, ToolGroup};
use crate::metadata::{MetadataError, ToolMetadata};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("failed to serialize parameter record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write to bus: {0}")]
    Write(#[from] redis::RedisError),
}

/// Every key this seeding pass wrote, in write order.
#[derive(Debug, Clone, Default)]
pub struct SeedOutcome {
    pub metadata_keys: Vec<String>,
    pub sink_key: String,
    pub meister_keys: Vec<String>,
}

pub async fn seed<B: BusClient>(
    commands: &mut B,
    config: &CoordinatorConfig,
    wire: &BusWireConfig,
    group: &ToolGroup,
) -> Result<SeedOutcome, RegistryError> {
    let metadata = ToolMetadata::load(&config.tool_scripts_path())?;
    let mut metadata_keys = Vec::with_capacity(metadata.entries.len());
    for (name, value) in &metadata.entries {
        let key = format!("tool-metadata-{name}");
        let payload = serde_json::to_string(value)?;
        commands.set(&key, payload).await?;
        metadata_keys.push(key);
    }

    let sink_params = SinkParams {
        channel: wire.main_channel.clone(),
        benchmark_run_dir: config.benchmark_run_dir.clone(),
        group: group.name().to_string(),
    };
    let sink_key = sink_key(group.name());
    commands
        .set(&sink_key, serde_json::to_string(&sink_params)?)
        .await?;

    let mut meister_keys = Vec::with_capacity(group.hostnames().len());
    for host in group.hostnames() {
        let tools = group.host_descriptor(host).tools;
        let meister_params = MeisterParams {
            benchmark_run_dir: config.benchmark_run_dir.clone(),
            channel: wire.main_channel.clone(),
            controller: config.controller_fqdn().to_string(),
            group: group.name().to_string(),
            hostname: host.clone(),
            tools,
        };
        let key = meister_key(group.name(), host);
        commands
            .set(&key, serde_json::to_string(&meister_params)?)
            .await?;
        meister_keys.push(key);
    }

    Ok(SeedOutcome {
        metadata_keys,
        sink_key,
        meister_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool_group::ToolGroupLoader;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct FakeBus {
        writes: BTreeMap<String, String>,
    }

    #[async_trait::async_trait]
    impl BusClient for FakeBus {
        async fn set(&mut self, key: &str, value: String) -> Result<(), redis::RedisError> {
            self.writes.insert(key.to_string(), value);
            Ok(())
        }

        async fn publish(&mut self, _channel: &str, _payload: String) -> Result<(), redis::RedisError> {
            Ok(())
        }
    }

    fn test_config(install_dir: PathBuf, benchmark_run_dir: PathBuf) -> CoordinatorConfig {
        CoordinatorConfig {
            benchmark_run_dir,
            hostname: "node-a".to_string(),
            full_hostname: "node-a.example.com".to_string(),
            agent_config_path: install_dir.join("config").join("pbench-agent.cfg"),
            pbench_run: install_dir.clone(),
            install_dir,
            verbose: false,
            unit_test_controller_override: true,
            rendezvous_timeout: None,
        }
    }

    #[tokio::test]
    async fn seed_writes_sink_key_for_empty_group_and_no_meister_keys() {
        let install_dir = TempDir::new().unwrap();
        let run_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(install_dir.path().join("config")).unwrap();
        std::fs::write(
            install_dir.path().join("config").join("tool-scripts.json"),
            r#"{"mpstat": {"kind": "sysstat"}}"#,
        )
        .unwrap();

        let group_root = run_dir.path().join("tools-v1-default");
        std::fs::create_dir_all(&group_root).unwrap();
        let group = ToolGroupLoader::load("default", &group_root).unwrap();

        let config = test_config(install_dir.path().to_path_buf(), run_dir.path().to_path_buf());
        let wire = BusWireConfig::default();
        let mut bus = FakeBus::default();

        let outcome = seed(&mut bus, &config, &wire, &group).await.unwrap();

        assert_eq!(outcome.metadata_keys, vec!["tool-metadata-mpstat".to_string()]);
        assert!(outcome.meister_keys.is_empty());
        assert!(bus.writes.contains_key(&outcome.sink_key));
        assert!(bus.writes.contains_key("tool-metadata-mpstat"));
        assert_eq!(bus.writes.len(), 2);
    }

    #[tokio::test]
    async fn seed_writes_one_meister_key_per_host() {
        let install_dir = TempDir::new().unwrap();
        let run_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(install_dir.path().join("config")).unwrap();
        std::fs::write(install_dir.path().join("config").join("tool-scripts.json"), "{}").unwrap();

        let group_root = run_dir.path().join("tools-v1-default");
        std::fs::create_dir_all(group_root.join("node-a")).unwrap();
        std::fs::create_dir_all(group_root.join("node-b")).unwrap();
        let group = ToolGroupLoader::load("default", &group_root).unwrap();

        let config = test_config(install_dir.path().to_path_buf(), run_dir.path().to_path_buf());
        let wire = BusWireConfig::default();
        let mut bus = FakeBus::default();

        let outcome = seed(&mut bus, &config, &wire, &group).await.unwrap();

        assert_eq!(outcome.meister_keys.len(), 2);
        for key in &outcome.meister_keys {
            assert!(bus.writes.contains_key(key));
        }
    }
}
