// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent registration records published on the start channel during rendezvous.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Sink,
    Meister,
}

/// A single agent's self-announcement: `{"kind": "...", "hostname": "...", "pid": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentRegistration {
    pub kind: AgentKind,
    #[serde(rename = "hostname")]
    pub host: String,
    pub pid: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationDecodeError {
    #[error("registration payload is not valid UTF-8")]
    NotUtf8,
    #[error("malformed registration payload: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl AgentRegistration {
    pub fn try_from_payload(bytes: &[u8]) -> Result<Self, RegistrationDecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| RegistrationDecodeError::NotUtf8)?;
        serde_json::from_str(text).map_err(RegistrationDecodeError::Malformed)
    }
}

/// The complete set of registrations collected during rendezvous, persisted
/// under the `tm-pids` key once the watcher is satisfied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentIdRegistry {
    pub sink: AgentRegistration,
    pub meister: Vec<AgentRegistration>,
}
