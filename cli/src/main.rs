// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use clap::Parser;

/// Bootstraps a tool meister fleet: brings up the coordination bus, seeds
/// it with parameters, spawns the local sink and meister plus one remote
/// meister per host, and waits for the full fleet to register.
#[derive(Parser)]
#[command(name = "tool-meister-start", version, about)]
struct Cli {
    /// Tool group to start (the `<group>` in `tools-v1-<group>`)
    #[arg(default_value = "default")]
    group: String,

    /// Parse the tool group, launch the bus, and seed parameters without
    /// spawning any agents
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = if cli.dry_run {
        tm_start_core::coordinator::run_dry_run(&cli.group).await
    } else {
        tm_start_core::coordinator::run_start(&cli.group).await
    };

    std::process::exit(code);
}

fn init_logging() {
    let debug = std::env::var("_PBENCH_TOOL_MEISTER_START_LOG_LEVEL")
        .map(|v| v.eq_ignore_ascii_case("debug"))
        .unwrap_or(false);
    let default_directive = if debug { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}
