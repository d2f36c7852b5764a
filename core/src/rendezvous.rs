// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Watches the start channel for agent self-registrations (component E).

use std::time::Duration;

use futures_util::StreamExt;
use redis::aio::PubSub;

use crate::domain::{AgentIdRegistry, AgentKind, AgentRegistration};

#[derive(Debug, thiserror::Error)]
pub enum RendezvousError {
    #[error("rendezvous timed out waiting for the remaining agents to register")]
    Timeout,
    #[error("start channel closed before all agents registered")]
    ChannelClosed,
    #[error("failed to read message payload: {0}")]
    Payload(#[from] redis::RedisError),
}

/// Pure accumulator for the rendezvous termination condition: exactly one
/// sink and `expected_meister` meisters registered. Kept free of any bus
/// I/O so the termination/duplicate/malformed-skip logic can be unit-tested
/// directly, without a live pub/sub connection.
#[derive(Debug, Default)]
struct RendezvousState {
    sink: Option<AgentRegistration>,
    meister: Vec<AgentRegistration>,
}

impl RendezvousState {
    /// Folds one already-decoded registration in. Returns the completed
    /// registry once `expected_meister` meisters and exactly one sink have
    /// been seen; a duplicate sink is logged and ignored rather than
    /// replacing the first one.
    fn observe(&mut self, reg: AgentRegistration, expected_meister: usize) -> Option<AgentIdRegistry> {
        match reg.kind {
            AgentKind::Sink => {
                if self.sink.is_some() {
                    tracing::warn!(host = %reg.host, "duplicate sink registration, ignoring");
                    return None;
                }
                self.sink = Some(reg);
            }
            AgentKind::Meister => self.meister.push(reg),
        }

        if self.meister.len() == expected_meister {
            if let Some(sink) = self.sink.clone() {
                return Some(AgentIdRegistry {
                    sink,
                    meister: self.meister.clone(),
                });
            }
        }
        None
    }
}

/// Blocks until exactly one sink and `expected_meister` meisters have
/// registered on the start channel, or until `timeout` elapses (if set).
/// Unknown kinds and malformed payloads are logged and skipped rather than
/// treated as failures — a stray publisher on the channel shouldn't wedge
/// startup.
pub async fn await_registrations(
    pubsub: &mut PubSub,
    expected_meister: usize,
    timeout: Option<Duration>,
) -> Result<AgentIdRegistry, RendezvousError> {
    let mut state = RendezvousState::default();
    let mut stream = pubsub.on_message();

    loop {
        let next = match timeout {
            Some(d) => tokio::time::timeout(d, stream.next())
                .await
                .map_err(|_| RendezvousError::Timeout)?,
            None => stream.next().await,
        };
        let msg = next.ok_or(RendezvousError::ChannelClosed)?;
        let payload: Vec<u8> = msg.get_payload()?;

        let reg = match AgentRegistration::try_from_payload(&payload) {
            Ok(reg) => reg,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed agent registration");
                continue;
            }
        };

        if let Some(registry) = state.observe(reg, expected_meister) {
            return Ok(registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(kind: AgentKind, host: &str) -> AgentRegistration {
        AgentRegistration {
            kind,
            host: host.to_string(),
            pid: 4242,
        }
    }

    #[test]
    fn completes_once_sink_and_every_meister_registered() {
        let mut state = RendezvousState::default();
        assert!(state.observe(registration(AgentKind::Meister, "node-a"), 2).is_none());
        assert!(state.observe(registration(AgentKind::Sink, "controller"), 2).is_none());
        let registry = state
            .observe(registration(AgentKind::Meister, "node-b"), 2)
            .expect("rendezvous should complete on the second meister");
        assert_eq!(registry.meister.len(), 2);
        assert_eq!(registry.sink.host, "controller");
    }

    #[test]
    fn zero_expected_meister_completes_on_sink_alone() {
        let mut state = RendezvousState::default();
        let registry = state
            .observe(registration(AgentKind::Sink, "controller"), 0)
            .expect("rendezvous with zero expected meisters should complete on sink registration");
        assert!(registry.meister.is_empty());
    }

    #[test]
    fn duplicate_sink_is_ignored_not_fatal() {
        let mut state = RendezvousState::default();
        assert!(state.observe(registration(AgentKind::Sink, "controller"), 1).is_none());
        assert!(state
            .observe(registration(AgentKind::Sink, "controller-2"), 1)
            .is_none());
        let registry = state
            .observe(registration(AgentKind::Meister, "node-a"), 1)
            .expect("rendezvous should still complete using the first sink");
        assert_eq!(registry.sink.host, "controller");
    }
}
