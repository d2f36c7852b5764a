// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Teardown compensator (component F): best-effort terminate broadcast
//! followed by an unconditional force-kill of the bus.

use serde::Serialize;

use crate::bus::{BusClient, BusHandle, BusWireConfig, TeardownCode};

#[derive(Debug, Serialize)]
struct TerminateMessage<'a> {
    action: &'static str,
    group: &'a str,
    directory: Option<String>,
}

/// Publishes a best-effort terminate message on the main channel (agents
/// still alive get a chance to exit cleanly) then force-kills the bus
/// regardless of whether the publish succeeded.
pub async fn compensate<B: BusClient>(
    commands: Option<&mut B>,
    bus: &BusHandle,
    wire: &BusWireConfig,
    group: &str,
) -> TeardownCode {
    if let Some(commands) = commands {
        let message = TerminateMessage {
            action: "terminate",
            group,
            directory: None,
        };
        match serde_json::to_string(&message) {
            Ok(payload) => {
                if let Err(e) = commands.publish(&wire.main_channel, payload).await {
                    tracing::warn!(error = %e, "failed to publish terminate message");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize terminate message"),
        }
    }

    bus.kill().await
}
