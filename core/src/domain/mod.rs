// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain types shared by every phase of the startup coordinator.

pub mod params;
pub mod registration;
pub mod tool_group;

pub use params::{meister_key, sink_key, MeisterParams, SinkParams};
pub use registration::{AgentIdRegistry, AgentKind, AgentRegistration, RegistrationDecodeError};
pub use tool_group::{HostDescriptor, ToolGroup, ToolGroupError, ToolGroupLoader};
