// Router Control - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # Router Control
//!
//! A headless configuration daemon for Linux router appliances.
//!
//! Edits stage in a JSON store and an explicit apply pushes them onto
//! the host through netplan, iptables, the kernel routing table, and
//! dnsmasq. Clients talk to the daemon over the system D-Bus.

use std::env;
use std::process::ExitCode;

mod api;
mod backend;
mod daemon;
mod manager;
mod models;
mod monitor;
mod shell;
mod staging;
mod store;

/// Human-readable daemon name.
pub const APP_NAME: &str = "Router Control";

/// Daemon version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print version information and exit.
fn print_version() {
    println!("{} {}", APP_NAME, VERSION);
    println!("Copyright (C) 2026 Christos A. Daggas");
    println!("License: MIT");
    println!();
    println!("A headless configuration daemon for Linux router appliances.");
}

/// Print help information and exit.
fn print_help() {
    println!(
        "Usage: {} [OPTIONS]",
        env::args()
            .next()
            .unwrap_or_else(|| "router-control".to_string())
    );
    println!();
    println!("A headless configuration daemon for Linux router appliances.");
    println!();
    println!("Options:");
    println!("  -h, --help       Show this help message and exit");
    println!("  -v, --version    Show version information and exit");
    println!("  -d, --debug      Enable debug logging");
    println!();
    println!("Environment variables:");
    println!("  RUST_LOG         Set log level (trace, debug, info, warn, error)");
    println!();
    println!("Report bugs to: https://github.com/christosdaggas/router-control/issues");
}

/// Warn about missing host tools. Applies that need an absent tool
/// fail with a clear error at apply time, not at startup.
fn preflight_checks() {
    for tool in ["ip", "iptables", "netplan", "systemctl"] {
        if shell::which(tool).is_none() {
            tracing::warn!("'{}' not found in PATH; applies that need it will fail", tool);
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut debug_mode = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            "-d" | "--debug" => {
                debug_mode = true;
            }
            _ => {
                if arg.starts_with('-') {
                    eprintln!("Unknown option: {}", arg);
                    eprintln!("Try '--help' for more information.");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    // The configuration file can set the log level, so it is read
    // before the subscriber goes up.
    let config = models::AppConfig::load();

    let log_level = if debug_mode {
        tracing::Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .init();

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    preflight_checks();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(daemon::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Daemon failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
