// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Launches the coordination bus (component B) and owns its lifecycle.
//!
//! The bus is a daemonizing `redis-server` process. We write it a config
//! file, spawn it, then poll until a client can connect, subscribe to the
//! start channel, and observe exactly one subscriber on that channel.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;
use tokio::process::Command;
use tokio::time::sleep;

use crate::config::CoordinatorConfig;

const REDIS_MAX_WAIT: Duration = Duration::from_secs(60);
const REDIS_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct BusWireConfig {
    pub port: u16,
    pub main_channel: String,
}

impl Default for BusWireConfig {
    fn default() -> Self {
        Self {
            port: 17001,
            main_channel: "tool-meister-chan".to_string(),
        }
    }
}

impl BusWireConfig {
    pub fn start_channel(&self) -> String {
        format!("{}-start", self.main_channel)
    }

    pub fn address(&self) -> String {
        format!("redis://127.0.0.1:{}/", self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to write bus config file {0}: {1}")]
    WriteConfig(PathBuf, #[source] std::io::Error),
    #[error("failed to launch bus process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("bus process exited with a non-zero status, teardown code {0:?}")]
    LaunchFailed(TeardownCode),
    #[error("bus did not become reachable within {0:?}, teardown code {1:?}")]
    Unreachable(Duration, TeardownCode),
    #[error("bus protocol error: {0}")]
    Protocol(#[from] redis::RedisError),
}

/// An exit code produced while force-terminating the bus process, per the
/// pid-file kill contract shared with [`crate::teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TeardownCode {
    SignalDelivered = 1,
    PidFileUnreadable = 2,
    PidFileInvalid = 3,
    ProcessNotFound = 4,
    KernelError = 5,
    Unexpected = 6,
}

/// The bus-side operations component C and F need. Abstracted behind a
/// trait (the way the teacher's `SwarmService` in
/// `orchestrator/swarm/src/application/mod.rs` abstracts its own
/// coordination calls) so the registry seeder and teardown compensator can
/// be unit-tested against an in-memory double instead of a live bus.
#[async_trait::async_trait]
pub trait BusClient: Send {
    async fn set(&mut self, key: &str, value: String) -> Result<(), redis::RedisError>;
    async fn publish(&mut self, channel: &str, payload: String) -> Result<(), redis::RedisError>;
}

#[async_trait::async_trait]
impl BusClient for ConnectionManager {
    async fn set(&mut self, key: &str, value: String) -> Result<(), redis::RedisError> {
        AsyncCommands::set(self, key, value).await
    }

    async fn publish(&mut self, channel: &str, payload: String) -> Result<(), redis::RedisError> {
        AsyncCommands::publish(self, channel, payload).await
    }
}

/// A live bus: the pid-file based handle plus both connections an agent
/// coordinator needs (a command connection and the start-channel
/// subscription opened while validating readiness).
pub struct BusSession {
    pub handle: BusHandle,
    pub commands: ConnectionManager,
    pub subscription: PubSub,
}

pub struct BusHandle {
    pid_file: PathBuf,
}

impl BusHandle {
    #[cfg(test)]
    pub(crate) fn for_test(pid_file: PathBuf) -> Self {
        Self { pid_file }
    }

    /// Force-terminates the bus by reading its pid file and sending SIGKILL.
    pub async fn kill(&self) -> TeardownCode {
        let contents = match tokio::fs::read_to_string(&self.pid_file).await {
            Ok(c) => c,
            Err(_) => return TeardownCode::PidFileUnreadable,
        };
        let pid: i32 = match contents.trim().parse() {
            Ok(p) => p,
            Err(_) => return TeardownCode::PidFileInvalid,
        };

        let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
        if rc == 0 {
            TeardownCode::SignalDelivered
        } else {
            match std::io::Error::last_os_error().raw_os_error() {
                Some(libc::ESRCH) => TeardownCode::ProcessNotFound,
                Some(_) => TeardownCode::KernelError,
                None => TeardownCode::Unexpected,
            }
        }
    }
}

const CONFIG_TEMPLATE: &str = "\
bind 127.0.0.1 {{BIND_HOST}}
port {{PORT}}
daemonize yes
dir {{DIR}}
dbfilename pbench-redis.rdb
pidfile {{PIDFILE}}
";

/// Writes the bus config, launches it, and blocks until it is ready to
/// accept subscribers on the start channel.
pub async fn start(config: &CoordinatorConfig, wire: &BusWireConfig) -> Result<BusSession, BusError> {
    let tm_dir = config.tm_dir();
    tokio::fs::create_dir_all(&tm_dir)
        .await
        .map_err(|source| BusError::WriteConfig(tm_dir.clone(), source))?;

    let pid_file = tm_dir.join(format!("redis_{}.pid", wire.port));
    let conf_path = tm_dir.join("redis.conf");

    let conf_body = CONFIG_TEMPLATE
        .replace("{{BIND_HOST}}", config.controller_fqdn())
        .replace("{{PORT}}", &wire.port.to_string())
        .replace("{{DIR}}", &tm_dir.display().to_string())
        .replace("{{PIDFILE}}", &pid_file.display().to_string());

    tokio::fs::write(&conf_path, conf_body)
        .await
        .map_err(|source| BusError::WriteConfig(conf_path.clone(), source))?;

    let handle = BusHandle { pid_file };

    let status = Command::new("redis-server")
        .arg(&conf_path)
        .status()
        .await
        .map_err(BusError::Spawn)?;
    if !status.success() {
        let code = handle.kill().await;
        return Err(BusError::LaunchFailed(code));
    }

    let start_channel = wire.start_channel();
    let address = wire.address();
    let deadline = Instant::now() + REDIS_MAX_WAIT;

    match retry_until_ready(
        || try_connect(&address, &start_channel),
        deadline,
        REDIS_POLL_INTERVAL,
    )
    .await
    {
        Ok((commands, subscription)) => Ok(BusSession {
            handle,
            commands,
            subscription,
        }),
        Err(()) => {
            let code = handle.kill().await;
            Err(BusError::Unreachable(REDIS_MAX_WAIT, code))
        }
    }
}

/// Retries `attempt` on a fixed interval until it succeeds or `deadline`
/// passes, at which point it reports a bare timeout (`Err(())`) rather than
/// the last underlying error, matching the bus's "sleep 100ms and retry,
/// fail after REDIS_MAX_WAIT" contract. Generic over the attempt's success
/// type so the retry/backoff control flow can be unit-tested without a live
/// redis connection.
async fn retry_until_ready<F, Fut, T>(mut attempt: F, deadline: Instant, poll_interval: Duration) -> Result<T, ()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, redis::RedisError>>,
{
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(_) if Instant::now() < deadline => sleep(poll_interval).await,
            Err(_) => return Err(()),
        }
    }
}

async fn try_connect(
    address: &str,
    start_channel: &str,
) -> Result<(ConnectionManager, PubSub), redis::RedisError> {
    let client = redis::Client::open(address)?;
    let mut commands = client.get_connection_manager().await?;
    let mut subscription = client.get_async_pubsub().await?;
    subscription.subscribe(start_channel).await?;

    let (_channel, count): (String, i64) = redis::cmd("PUBSUB")
        .arg("NUMSUB")
        .arg(start_channel)
        .query_async(&mut commands)
        .await?;
    if count != 1 {
        return Err(redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "unexpected start channel subscriber count",
        )));
    }

    Ok((commands, subscription))
}

impl BusSession {
    pub async fn publish(&mut self, channel: &str, payload: &str) -> Result<(), redis::RedisError> {
        self.commands.publish::<_, _, ()>(channel, payload).await
    }
}
