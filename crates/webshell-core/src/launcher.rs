//! Invocation strategies
//!
//! A [`Launcher`] turns a command line into a program and argument vector.
//! One is picked at startup from [`ExecPolicy`] and the target platform:
//! - [`ShellLauncher`]: `/bin/sh -c <line>` (unix) or `cmd /C <line>` (Windows),
//!   so pipes, redirection, chaining and globbing work.
//! - [`DirectLauncher`]: whitespace split, exec'd directly. Shell syntax is
//!   passed through as literal arguments.

use std::sync::Arc;

use tokio::process::Command;

use crate::command::CommandLine;
use crate::config::ExecPolicy;
use crate::error::{Error, Result};

/// Shell builtins and keywords that never resolve on PATH
const SHELL_BUILTINS: &[&str] = &[
    ".", ":", "[", "[[", "!", "{", "}", "alias", "bg", "break", "case", "cd", "command",
    "continue", "do", "done", "echo", "elif", "else", "esac", "eval", "exec", "exit", "export",
    "false", "fg", "fi", "for", "function", "getopts", "hash", "if", "jobs", "kill", "local",
    "printf", "pwd", "read", "readonly", "return", "select", "set", "shift", "source", "test",
    "then", "time", "times", "trap", "true", "type", "ulimit", "umask", "unalias", "unset",
    "until", "wait", "while",
];

/// A resolved process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path
    pub program: String,
    /// Arguments, not including the program
    pub args: Vec<String>,
}

impl Invocation {
    /// Build a tokio command for this invocation (stdio not configured)
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Strategy turning a command line into an invocation
pub trait Launcher: Send + Sync + std::fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Resolve `line`. `Err(Error::NotFound)` when the program is known to be missing.
    fn resolve(&self, line: &CommandLine) -> Result<Invocation>;
}

/// Runs the whole line through the platform command interpreter
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    interpreter: String,
    flag: String,
    precheck: bool,
}

impl ShellLauncher {
    /// Interpreter for the target platform
    #[must_use]
    pub fn platform() -> Self {
        #[cfg(windows)]
        {
            Self::new("cmd", "/C").with_precheck(false)
        }
        #[cfg(not(windows))]
        {
            Self::new("/bin/sh", "-c").with_precheck(true)
        }
    }

    /// Custom interpreter, e.g. `("/bin/bash", "-c")`
    #[must_use]
    pub fn new(interpreter: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            flag: flag.into(),
            precheck: false,
        }
    }

    /// Look the first word up on PATH before spawning the interpreter
    #[must_use]
    pub fn with_precheck(mut self, precheck: bool) -> Self {
        self.precheck = precheck;
        self
    }
}

impl Launcher for ShellLauncher {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn resolve(&self, line: &CommandLine) -> Result<Invocation> {
        if self.precheck && is_simple_command(line.as_str()) {
            check_on_path(line.program())?;
        }
        Ok(Invocation {
            program: self.interpreter.clone(),
            args: vec![self.flag.clone(), line.to_string()],
        })
    }
}

/// Splits on whitespace and executes the first word directly
#[derive(Debug, Clone, Default)]
pub struct DirectLauncher;

impl Launcher for DirectLauncher {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn resolve(&self, line: &CommandLine) -> Result<Invocation> {
        let mut parts = line.as_str().split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(Error::EmptyCommand)?;
        Ok(Invocation {
            program,
            args: parts.collect(),
        })
    }
}

/// Select the launcher for a policy on this platform
#[must_use]
pub fn launcher_for(policy: ExecPolicy) -> Arc<dyn Launcher> {
    match policy {
        ExecPolicy::Shell => Arc::new(ShellLauncher::platform()),
        ExecPolicy::Direct => Arc::new(DirectLauncher),
    }
}

/// No operators, redirection, expansion or grouping anywhere in the line.
/// Anything else may recover from a missing first word (`tool || echo fallback`).
fn is_simple_command(line: &str) -> bool {
    !line.chars().any(|c| {
        matches!(
            c,
            '|' | '&' | ';' | '<' | '>' | '$' | '`' | '(' | ')' | '{' | '}' | '\n'
        )
    })
}

/// Fail with `NotFound` only for a plain word that the shell would also fail on.
/// Paths, assignments, builtins and anything with shell syntax are left to the shell.
fn check_on_path(word: &str) -> Result<()> {
    let plain = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'));
    if !plain || word.starts_with('-') || SHELL_BUILTINS.contains(&word) {
        return Ok(());
    }
    which::which(word)
        .map(|_| ())
        .map_err(|_| Error::NotFound(word.to_string()))
}
