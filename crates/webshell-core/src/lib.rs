//! Webshell Core - Command Execution and Output Streaming
//!
//! This crate provides the engine behind the webshell server:
//! - Protocol: Output chunk envelope and system info message codec
//! - Executor: Subprocess lifecycle with deadline and cancellation
//! - Drain: Chunked, concurrent capture of stdout/stderr
//! - Session: Per-connection receive loop with a FIFO command worker

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod drain;
pub mod error;
pub mod executor;
pub mod launcher;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;

pub use command::{CommandLine, Inbound};
pub use config::{ExecConfig, ExecPolicy, OutputMode, SessionConfig};
pub use drain::drain;
pub use error::{Error, Result};
pub use executor::{CommandExecutor, Outcome};
pub use launcher::{launcher_for, DirectLauncher, Invocation, Launcher, ShellLauncher};
pub use protocol::{OutputChunk, StreamTag, SystemInfo, COMMAND_COMPLETE, SYSTEM_INFO_PREFIX};
pub use session::{Session, SessionEnd};
pub use sink::{ChannelSink, CollectSink, OutputSink};
pub use transport::{TransportReceiver, TransportSender};
