use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Pipe stdout/stderr, close stdin and isolate the process group so a kill
/// reaches everything the shell started.
pub(super) fn prepare(cmd: &mut Command) {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }
}

/// Kill the process group (unix) and the child, then reap it.
pub(super) async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!(pid, error = %e, "killpg failed");
            }
        }
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Kill after group termination failed");
    }
}

/// Give drains `grace` to hit EOF after a kill; abort whatever is left.
/// Returns once no drain can deliver another chunk.
pub(super) async fn settle(tracker: &TaskTracker, drains: [&JoinHandle<u64>; 2], grace: Duration) {
    if tokio::time::timeout(grace, tracker.wait()).await.is_ok() {
        return;
    }
    warn!(grace_ms = grace.as_millis() as u64, "Output pipes still open after kill, aborting drains");
    for handle in drains {
        handle.abort();
    }
    tracker.wait().await;
}

/// Total bytes read by finished drains
pub(super) async fn drained_bytes(drains: [JoinHandle<u64>; 2]) -> u64 {
    let mut total = 0;
    for handle in drains {
        total += handle.await.unwrap_or(0);
    }
    total
}
