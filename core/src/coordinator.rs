// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Top-level state machine wiring components A–G together.

use redis::AsyncCommands;

use crate::bus::{self, BusSession, BusWireConfig};
use crate::classifier::{self, ClassifierDecision};
use crate::config::{ConfigError, CoordinatorConfig};
use crate::domain::tool_group::{ToolGroupError, ToolGroupLoader};
use crate::registry::{self, RegistryError};
use crate::rendezvous;
use crate::spawner;
use crate::teardown;

const TM_PIDS_KEY: &str = "tm-pids";

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ToolGroup(#[from] ToolGroupError),
    #[error(transparent)]
    Bus(#[from] bus::BusError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Runs the full startup sequence, returning the process exit code: `0` on
/// success, a teardown code (1-6) on a compensated failure, or `1` if the
/// coordinator itself could not get off the ground (bad config, bad tool
/// group, unreachable bus).
pub async fn run_start(group_name: &str) -> i32 {
    match run_start_inner(group_name).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "startup coordinator failed before teardown was possible");
            1
        }
    }
}

async fn run_start_inner(group_name: &str) -> Result<i32, CoordinatorError> {
    let config = CoordinatorConfig::from_env()?;
    let wire = BusWireConfig::default();

    let root = config.tool_group_root(group_name);
    let group = ToolGroupLoader::load(group_name, &root)?;

    let BusSession {
        handle,
        mut commands,
        mut subscription,
    } = match bus::start(&config, &wire).await {
        Ok(session) => session,
        Err(bus::BusError::Unreachable(_, code)) | Err(bus::BusError::LaunchFailed(code)) => {
            return Ok(code as i32)
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = registry::seed(&mut commands, &config, &wire, &group).await {
        tracing::error!(error = %e, "failed to seed registry, tearing down");
        let code = teardown::compensate(Some(&mut commands), &handle, &wire, group_name).await;
        return Ok(code as i32);
    }

    let outcome = spawner::spawn_all(&config, &wire, &group).await;
    if classifier::classify(&outcome) == ClassifierDecision::Teardown {
        for (host, reason) in &outcome.failed {
            tracing::error!(host = %host, reason = %reason, "agent failed to start");
        }
        let code = teardown::compensate(Some(&mut commands), &handle, &wire, group_name).await;
        return Ok(code as i32);
    }

    let expected_meister = outcome.meister_count();
    match rendezvous::await_registrations(&mut subscription, expected_meister, config.rendezvous_timeout)
        .await
    {
        Ok(registrations) => {
            let payload = serde_json::to_string(&registrations)?;
            commands.set::<_, _, ()>(TM_PIDS_KEY, payload).await?;
            Ok(0)
        }
        Err(e) => {
            tracing::error!(error = %e, "rendezvous failed, tearing down");
            let code = teardown::compensate(Some(&mut commands), &handle, &wire, group_name).await;
            Ok(code as i32)
        }
    }
}

/// Performs phases A–C (tool group parse, bus launch, registry seed) and
/// reports what would be spawned, without actually fanning agents out. Used
/// to validate a tool group and its controller/bus reachability ahead of a
/// real run.
pub async fn run_dry_run(group_name: &str) -> i32 {
    match run_dry_run_inner(group_name).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "dry run failed");
            1
        }
    }
}

async fn run_dry_run_inner(group_name: &str) -> Result<(), CoordinatorError> {
    let config = CoordinatorConfig::from_env()?;
    let wire = BusWireConfig::default();

    let root = config.tool_group_root(group_name);
    let group = ToolGroupLoader::load(group_name, &root)?;

    let BusSession { handle, mut commands, .. } = bus::start(&config, &wire).await?;
    let seeded = registry::seed(&mut commands, &config, &wire, &group).await?;

    tracing::info!(
        group = %group.name(),
        hosts = group.hostnames().len(),
        metadata_keys = seeded.metadata_keys.len(),
        sink_key = %seeded.sink_key,
        meister_keys = ?seeded.meister_keys,
        "dry run would spawn sink and {} meister(s)",
        group.hostnames().len(),
    );
    for host in group.hostnames() {
        tracing::info!(host = %host, tools = ?group.host_descriptor(host).tools, "would spawn meister");
    }

    teardown::compensate(Some(&mut commands), &handle, &wire, group_name).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn config_errors_convert_into_coordinator_error() {
        let err: CoordinatorError = ConfigError::MissingEnv("benchmark_run_dir").into();
        assert!(err.to_string().contains("benchmark_run_dir"));
    }

    #[test]
    fn tool_group_errors_convert_into_coordinator_error() {
        let err: CoordinatorError =
            ToolGroupError::BadGroup(std::path::PathBuf::from("/tmp/missing")).into();
        assert!(err.to_string().contains("missing"));
    }
}
