// Router Control - Shell Executor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Single gate for every external command the daemon runs.
//!
//! All interaction with `iptables`, `ip`, `ethtool`, `netplan`,
//! `systemctl` and friends goes through [`CommandRunner`], so tests can
//! substitute a scripted runner and every invocation gets the same
//! timeout, logging, and error mapping. Nothing here retries: callers
//! that mutate host state must see the first failure.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::models::error::{Error, Result};

/// Timeout applied when none is configured.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process died to a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best human-readable failure reason: stderr, then stdout, then
    /// the bare exit code.
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Executes external commands. Implemented by the real system runner
/// and by scripted runners in tests.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, wait for exit, capture output.
    ///
    /// `Err` means the command could not be run to completion (spawn
    /// failure, timeout). A command that ran and exited non-zero is
    /// `Ok` with `success() == false`; the caller decides whether that
    /// is an error.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Check if a command exists in PATH.
pub fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Real runner: spawns the process with piped stdio and a hard deadline.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let rendered = render_command(program, args);
        debug!("Executing: {}", rendered);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::command_failed(&rendered, e.to_string()))?;

        // Drain both pipes off-thread so a chatty child cannot block on
        // a full pipe while we poll for exit.
        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::TimedOut => {
                warn!(
                    "Command timed out after {}s, killing: {}",
                    self.timeout.as_secs(),
                    rendered
                );
                let _ = child.kill();
                let _ = child.wait();
                join_reader(stdout_reader);
                join_reader(stderr_reader);
                return Err(Error::CommandTimeout(rendered));
            }
            WaitOutcome::PollFailed(e) => {
                let _ = child.kill();
                let _ = child.wait();
                join_reader(stdout_reader);
                join_reader(stderr_reader);
                return Err(Error::command_failed(&rendered, e.to_string()));
            }
        };

        let output = CommandOutput {
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
            code: status.code(),
        };
        trace!(
            "Command finished: {} (code {:?}, {} bytes stdout)",
            rendered,
            output.code,
            output.stdout.len()
        );
        Ok(output)
    }
}

enum WaitOutcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    PollFailed(std::io::Error),
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> WaitOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return WaitOutcome::Exited(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    return WaitOutcome::TimedOut;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return WaitOutcome::PollFailed(e),
        }
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_which_finds_sh() {
        // 'sh' should exist on any Unix system
        assert!(which("sh").is_some());
        assert!(which("nonexistent_command_xyz").is_none());
    }

    #[test]
    fn test_run_captures_stdout() {
        let runner = SystemRunner::new();
        let out = runner.run("echo", &["hello"]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_nonzero_exit_is_ok_not_err() {
        let runner = SystemRunner::new();
        let out = runner.run("sh", &["-c", "echo oops >&2; exit 3"]).unwrap();
        assert!(!out.success());
        assert_eq!(out.code, Some(3));
        assert_eq!(out.error_message(), "oops");
    }

    #[test]
    fn test_missing_binary_is_err() {
        let runner = SystemRunner::new();
        let err = runner.run("nonexistent_command_xyz", &[]).unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[test]
    fn test_timeout_kills_child() {
        let runner = SystemRunner::with_timeout(Duration::from_millis(200));
        let start = Instant::now();
        let err = runner.run("sleep", &["5"]).unwrap_err();
        assert!(matches!(err, Error::CommandTimeout(_)));
        // Must not have waited for the full sleep
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_error_message_fallbacks() {
        let out = CommandOutput {
            stdout: "detail on stdout".to_string(),
            stderr: String::new(),
            code: Some(1),
        };
        assert_eq!(out.error_message(), "detail on stdout");

        let silent = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            code: Some(2),
        };
        assert_eq!(silent.error_message(), "exited with code 2");
    }

    #[test]
    fn test_scripted_runner_prefix_and_default() {
        let runner = testing::ScriptedRunner::new()
            .respond_ok("which netplan", "/usr/sbin/netplan\n")
            .respond_code("systemctl is-active", 3, "");

        let out = runner.run("which", &["netplan"]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "/usr/sbin/netplan");

        let out = runner
            .run("systemctl", &["is-active", "NetworkManager"])
            .unwrap();
        assert!(!out.success());

        // Unmatched commands succeed quietly
        let out = runner.run("iptables", &["-F", "CHAIN"]).unwrap();
        assert!(out.success());

        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.calls_matching("iptables").len(), 1);
    }
}
