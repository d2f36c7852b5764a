// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # tm-start-core
//!
//! Core library for the tool meister fleet startup coordinator.
//!
//! ## Layer Structure
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`config`] | Resolves the coordinator's required environment into a typed config |
//! | [`domain`] | `ToolGroup`, `AgentRegistration`, `AgentIdRegistry`, parameter records |
//! | [`bus`] | Launches the coordination bus and owns its lifecycle handle |
//! | [`metadata`] | Loads the static tool-metadata descriptor bundled with the install |
//! | [`registry`] | Seeds the bus with tool metadata and per-agent parameter records |
//! | [`spawner`] | Forks local sink/meister, fans out remote meisters over secure shell |
//! | [`rendezvous`] | Waits for the expected agent registrations on the start channel |
//! | [`teardown`] | Publishes the terminate broadcast and force-kills the bus |
//! | [`classifier`] | Maps a spawn outcome to a coordinator exit decision |
//! | [`coordinator`] | Top-level state machine wiring A–G together |

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod metadata;
pub mod registry;
pub mod rendezvous;
pub mod spawner;
pub mod teardown;

pub mod bus;
