// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Resolves the coordinator's required environment into a typed, validated
//! config. All environment reads happen here and nowhere else, mirroring the
//! precedent that config loading should front-load validation rather than
//! let bad values surface deep in the call stack.

use std::path::PathBuf;
use std::time::Duration;

const ENV_BENCHMARK_RUN_DIR: &str = "benchmark_run_dir";
const ENV_HOSTNAME: &str = "_pbench_hostname";
const ENV_FULL_HOSTNAME: &str = "_pbench_full_hostname";
const ENV_AGENT_CONFIG: &str = "_PBENCH_AGENT_CONFIG";
const ENV_PBENCH_RUN: &str = "pbench_run";
const ENV_LOG_LEVEL: &str = "_PBENCH_TOOL_MEISTER_START_LOG_LEVEL";
const ENV_UNIT_TESTS: &str = "_PBENCH_UNIT_TESTS";
const ENV_RENDEZVOUS_TIMEOUT: &str = "_PBENCH_TOOL_MEISTER_START_RENDEZVOUS_TIMEOUT_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Fully resolved coordinator configuration. Constructed once per run via
/// [`CoordinatorConfig::from_env`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub benchmark_run_dir: PathBuf,
    pub hostname: String,
    pub full_hostname: String,
    pub agent_config_path: PathBuf,
    pub pbench_run: PathBuf,
    pub install_dir: PathBuf,
    pub verbose: bool,
    pub unit_test_controller_override: bool,
    pub rendezvous_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let benchmark_run_dir = required_path(ENV_BENCHMARK_RUN_DIR)?;
        let hostname = required(ENV_HOSTNAME)?;
        let full_hostname = required(ENV_FULL_HOSTNAME)?;
        let agent_config_path = required_path(ENV_AGENT_CONFIG)?;
        let pbench_run = required_path(ENV_PBENCH_RUN)?;
        let install_dir = install_dir_from_agent_config(&agent_config_path);

        let verbose = optional(ENV_LOG_LEVEL)
            .map(|v| v.eq_ignore_ascii_case("debug"))
            .unwrap_or(false);

        let unit_test_controller_override = optional(ENV_UNIT_TESTS).is_some();

        let rendezvous_timeout = match optional(ENV_RENDEZVOUS_TIMEOUT) {
            None => None,
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_RENDEZVOUS_TIMEOUT,
                    value: raw,
                    reason: "must be a non-negative integer number of seconds".to_string(),
                })?;
                Some(Duration::from_secs(secs))
            }
        };

        let config = Self {
            benchmark_run_dir,
            hostname,
            full_hostname,
            agent_config_path,
            pbench_run,
            install_dir,
            verbose,
            unit_test_controller_override,
            rendezvous_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::InvalidEnv {
                name: ENV_HOSTNAME,
                value: self.hostname.clone(),
                reason: "must not be blank".to_string(),
            });
        }
        if self.full_hostname.trim().is_empty() {
            return Err(ConfigError::InvalidEnv {
                name: ENV_FULL_HOSTNAME,
                value: self.full_hostname.clone(),
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }

    /// The controller identifier meisters and the sink dial home to.
    /// Unit tests opt into a loopback override instead of the real fqdn.
    pub fn controller_fqdn(&self) -> &str {
        if self.unit_test_controller_override {
            "localhost"
        } else {
            &self.full_hostname
        }
    }

    pub fn tm_dir(&self) -> PathBuf {
        self.benchmark_run_dir.join("tm")
    }

    pub fn tool_group_root(&self, group: &str) -> PathBuf {
        self.pbench_run.join(format!("tools-v1-{group}"))
    }

    pub fn tool_scripts_path(&self) -> PathBuf {
        self.install_dir.join("config").join("tool-scripts.json")
    }

    pub fn remote_launcher_path(&self) -> PathBuf {
        self.install_dir
            .join("tool-meister")
            .join("pbench-tool-meister-remote")
    }

    pub fn local_meister_path(&self) -> PathBuf {
        self.install_dir.join("tool-meister").join("pbench-tool-meister")
    }

    pub fn sink_path(&self) -> PathBuf {
        self.install_dir
            .join("tool-meister")
            .join("pbench-tool-data-sink")
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv(name))
}

fn required_path(name: &'static str) -> Result<PathBuf, ConfigError> {
    required(name).map(PathBuf::from)
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok()
}

/// The installation root is `_PBENCH_AGENT_CONFIG`'s grandparent directory:
/// the config file lives at `<install_dir>/config/pbench-agent.cfg`, the
/// same `<install_dir>/config/...` and `<install_dir>/tool-meister/...`
/// layout `tool_scripts_path`/`remote_launcher_path`/`local_meister_path`/
/// `sink_path` already assume. Falls back to the historical default install
/// location if the path is too shallow to have a grandparent, so a
/// minimal/relative `_PBENCH_AGENT_CONFIG` in a unit test still resolves to
/// something usable.
fn install_dir_from_agent_config(agent_config_path: &std::path::Path) -> PathBuf {
    agent_config_path
        .parent()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/opt/pbench-agent"))
}
