// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Parameter records seeded into the bus for the sink and per-host meisters.
//!
//! Every field is backed by a `BTreeMap`/sorted collection so serialization
//! is deterministic: identical inputs always produce byte-identical JSON.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinkParams {
    pub channel: String,
    pub benchmark_run_dir: PathBuf,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeisterParams {
    pub benchmark_run_dir: PathBuf,
    pub channel: String,
    pub controller: String,
    pub group: String,
    pub hostname: String,
    pub tools: BTreeMap<String, String>,
}

pub fn sink_key(group: &str) -> String {
    format!("tds-{group}")
}

pub fn meister_key(group: &str, host: &str) -> String {
    format!("tm-{group}-{host}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_serialize_byte_identically() {
        let mut tools_a = BTreeMap::new();
        tools_a.insert("mpstat".to_string(), "--interval=3".to_string());
        tools_a.insert("iostat".to_string(), String::new());

        let mut tools_b = BTreeMap::new();
        tools_b.insert("iostat".to_string(), String::new());
        tools_b.insert("mpstat".to_string(), "--interval=3".to_string());

        let a = MeisterParams {
            benchmark_run_dir: PathBuf::from("/var/lib/pbench-agent/run-1"),
            channel: "tool-meister-chan".to_string(),
            controller: "ctrl.example.com".to_string(),
            group: "default".to_string(),
            hostname: "node-a".to_string(),
            tools: tools_a,
        };
        let b = MeisterParams { tools: tools_b, ..a.clone() };

        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn key_naming_matches_group_and_host() {
        assert_eq!(sink_key("default"), "tds-default");
        assert_eq!(meister_key("default", "node-a"), "tm-default-node-a");
    }
}
