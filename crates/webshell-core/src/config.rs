//! Executor and session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default execution deadline in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default drain read size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default time allowed for drains to finish after a kill
pub const DEFAULT_KILL_GRACE_MS: u64 = 2000;

/// Default number of commands waiting behind the running one
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Default consecutive send failures before a session gives up
pub const DEFAULT_MAX_SEND_FAILURES: u32 = 3;

/// How a command line becomes a process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecPolicy {
    /// Run through the platform interpreter (`/bin/sh -c`, `cmd /C`)
    #[default]
    Shell,
    /// Split on whitespace and exec directly. No pipes, quoting or globbing.
    Direct,
}

/// How process output reaches the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Tagged JSON chunks as they are read, then a completion marker
    #[default]
    Streaming,
    /// One raw text reply after the process exits
    Combined,
}

/// Configuration for command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Hard wall-clock limit per command
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bytes per pipe read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Invocation policy
    #[serde(default)]
    pub policy: ExecPolicy,
    /// Capture and delivery mode
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Grace period for drains after the process is killed
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_kill_grace_ms() -> u64 {
    DEFAULT_KILL_GRACE_MS
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            policy: ExecPolicy::default(),
            output_mode: OutputMode::default(),
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
        }
    }
}

impl ExecConfig {
    /// Execution deadline
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Drain grace period after a kill
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Configuration for one client session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Commands that may wait behind the running one
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Consecutive transport write failures tolerated
    #[serde(default = "default_max_send_failures")]
    pub max_send_failures: u32,
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_max_send_failures() -> u32 {
    DEFAULT_MAX_SEND_FAILURES
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_send_failures: DEFAULT_MAX_SEND_FAILURES,
        }
    }
}
