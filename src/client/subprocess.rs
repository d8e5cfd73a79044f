use std::collections::HashMap;
use tokio::process::Command;

/// Environment variables safe to pass through to a back-end's child
/// process regardless of per-client config.
const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "LC_ALL",
    "TZ",
    "TERM",
    "RUST_LOG",
    "TMPDIR",
    "XDG_RUNTIME_DIR",
];

/// `env_clear()` then copy the allowlisted vars from the current process,
/// then layer the client's own configured `env` map on top. Prevents
/// secrets held by the hub process from leaking into a back-end it spawns.
pub fn scrubbed_command(program: &str, args: &[String], extra_env: &HashMap<String, String>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.env_clear();
    for &var in ALLOWED_ENV_VARS {
        if let Ok(val) = std::env::var(var) {
            cmd.env(var, val);
        }
    }
    for (key, val) in extra_env {
        cmd.env(key, val);
    }
    cmd
}
