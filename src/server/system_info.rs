//! Host identity sent to every new session

use tracing::debug;
use webshell_core::SystemInfo;

const USER_VARS: [&str; 3] = ["USER", "USERNAME", "LOGNAME"];

/// Current user and host name, falling back to `user` / `web-cli`
pub fn lookup() -> SystemInfo {
    let mut info = SystemInfo::default();

    if let Some(user) = USER_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
    {
        info.username = user;
    }

    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy();
            if !name.is_empty() {
                info.hostname = name.into_owned();
            }
        }
        Err(e) => debug!(error = %e, "Hostname lookup failed, using fallback"),
    }

    info
}
