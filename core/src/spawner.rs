// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Forks the local sink and meister, fans out one remote meister per
//! non-controller host over secure shell (component D).
//!
//! A remote meister is reaped through `tokio::process::Child`, which binds
//! the OS handle to the exact child it spawned — the "reaped identifier
//! does not match the expected one" failure mode of manual `waitpid` polling
//! cannot occur here.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::bus::BusWireConfig;
use crate::config::CoordinatorConfig;
use crate::domain::{meister_key, sink_key, ToolGroup};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentHandle {
    Sink,
    LocalMeister,
    RemoteMeister { host: String },
}

#[derive(Debug, Clone, Default)]
pub struct SpawnOutcome {
    pub started: Vec<AgentHandle>,
    pub failed: Vec<(String, String)>,
}

impl SpawnOutcome {
    pub fn meister_count(&self) -> usize {
        self.started
            .iter()
            .filter(|h| !matches!(h, AgentHandle::Sink))
            .count()
    }
}

/// Spawns the sink, then the local and remote meisters, per the ordering
/// and failure semantics of component D: a sink failure is fatal to the
/// whole phase; a meister failure is merely recorded.
pub async fn spawn_all(
    config: &CoordinatorConfig,
    wire: &BusWireConfig,
    group: &ToolGroup,
) -> SpawnOutcome {
    let mut outcome = SpawnOutcome::default();

    if let Err(reason) = spawn_sink(config, wire, group).await {
        outcome.failed.push(("<sink>".to_string(), reason));
        return outcome;
    }
    outcome.started.push(AgentHandle::Sink);

    let controller = config.controller_fqdn().to_string();
    let mut remote_children: Vec<(String, Child)> = Vec::new();

    for host in group.hostnames() {
        if *host == controller {
            match spawn_local_meister(config, wire, group, host).await {
                Ok(()) => outcome.started.push(AgentHandle::LocalMeister),
                Err(reason) => outcome.failed.push((host.clone(), reason)),
            }
            continue;
        }

        match spawn_remote_meister(config, wire, group, &controller, host) {
            Ok(child) => remote_children.push((host.clone(), child)),
            Err(reason) => outcome.failed.push((host.clone(), reason)),
        }
    }

    let (started, failed) = reap_remote_children(remote_children).await;
    outcome.started.extend(started);
    outcome.failed.extend(failed);

    outcome
}

/// Waits out every remote meister's ssh child and sorts each into started or
/// failed, per the same "record, don't abort" treatment every other meister
/// failure gets. Split out from `spawn_all` so it can be exercised directly
/// against real child processes in tests.
async fn reap_remote_children(children: Vec<(String, Child)>) -> (Vec<AgentHandle>, Vec<(String, String)>) {
    let mut started = Vec::new();
    let mut failed = Vec::new();

    for (host, mut child) in children {
        match child.wait().await {
            Ok(status) if status.success() => {
                started.push(AgentHandle::RemoteMeister { host });
            }
            Ok(status) => {
                failed.push((host, format!("ssh exited with status {status}")));
            }
            Err(e) => {
                failed.push((host, format!("failed to reap ssh child: {e}")));
            }
        }
    }

    (started, failed)
}

/// Runs a child to completion and maps its exit status to the
/// "started fine or record the reason" shape the sink and local meister
/// both use.
async fn run_child_to_completion(mut command: Command, what: &str) -> Result<(), String> {
    let status = command
        .status()
        .await
        .map_err(|e| format!("failed to spawn {what}: {e}"))?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("{what} exited with status {status}"))
    }
}

async fn spawn_sink(
    config: &CoordinatorConfig,
    wire: &BusWireConfig,
    group: &ToolGroup,
) -> Result<(), String> {
    let key = sink_key(group.name());
    let mut command = Command::new(config.sink_path());
    command
        .arg("127.0.0.1")
        .arg(wire.port.to_string())
        .arg(&key)
        .stdin(Stdio::null())
        .stdout(Stdio::from(
            std::fs::File::create(config.tm_dir().join("sink.out")).map_err(|e| e.to_string())?,
        ))
        .stderr(Stdio::from(
            std::fs::File::create(config.tm_dir().join("sink.err")).map_err(|e| e.to_string())?,
        ));
    run_child_to_completion(command, "sink").await
}

async fn spawn_local_meister(
    config: &CoordinatorConfig,
    wire: &BusWireConfig,
    group: &ToolGroup,
    host: &str,
) -> Result<(), String> {
    let key = meister_key(group.name(), host);
    let mut command = Command::new(config.local_meister_path());
    command
        .arg("127.0.0.1")
        .arg(wire.port.to_string())
        .arg(&key)
        .stdin(Stdio::null())
        .stdout(Stdio::from(
            std::fs::File::create(config.tm_dir().join(format!("meister-{host}.out")))
                .map_err(|e| e.to_string())?,
        ))
        .stderr(Stdio::from(
            std::fs::File::create(config.tm_dir().join(format!("meister-{host}.err")))
                .map_err(|e| e.to_string())?,
        ));
    run_child_to_completion(command, "local meister").await
}

fn spawn_remote_meister(
    config: &CoordinatorConfig,
    wire: &BusWireConfig,
    group: &ToolGroup,
    controller: &str,
    host: &str,
) -> Result<Child, String> {
    let key = meister_key(group.name(), host);
    Command::new("ssh")
        .arg(host)
        .arg(config.remote_launcher_path())
        .arg(controller)
        .arg(wire.port.to_string())
        .arg(&key)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn ssh to {host}: {e}"))
}
