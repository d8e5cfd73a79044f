//! Loads `Config` from `HUB_*` env vars, overlaid on a TOML file, overlaid
//! on compiled-in defaults. Env wins when set; the file fills in anything
//! env left unset; `Config::default()` is the final fallback (spec.md §6,
//! see DESIGN.md Open Question 1 for why env takes precedence here instead
//! of the teacher's file-wins order).

use super::schema::Config;
use std::path::{Path, PathBuf};

/// Default config file location, following the same `dirs`-based resolution
/// `oxicrab` uses for its own home directory (`~/.config/toolhub/config.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("toolhub").join("config.toml"))
}

/// Load and validate a `Config`. `config_path` overrides the default
/// resolution; `None` falls back to `default_config_path()`, and a missing
/// file at that point is not an error (spec.md §6 — env+defaults alone are
/// a valid configuration).
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = config_path
        .map(Path::to_path_buf)
        .or_else(default_config_path);

    let mut config = match path.as_deref().map(std::fs::read_to_string) {
        Some(Ok(contents)) => toml::from_str(&contents)?,
        Some(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Some(Err(e)) => return Err(e.into()),
        None => Config::default(),
    };

    apply_env_overrides(&mut config);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_bool("HUB_ENABLED") {
        config.enabled = v;
    }
    if let Some(v) = env_bool("HUB_FILTERING") {
        config.filtering = v;
    }
    if let Some(v) = env_usize("HUB_MAX_TOOLS") {
        config.max_tools = v;
    }
    if let Some(v) = env_bool("HUB_FALLBACK") {
        config.fallback = v;
    }
    if let Some(v) = env_u64("HUB_DETECTION_TIMEOUT_MS") {
        config.detection_timeout_ms = v;
    }
    if let Some(v) = env_u64("HUB_CLIENT_TIMEOUT_MS") {
        config.client_timeout_ms = v;
    }
    if let Some(v) = env_bool("HUB_CACHE") {
        config.cache = v;
    }
    if let Some(v) = env_u64("HUB_CACHE_TTL_SEC") {
        config.detection_cache_ttl_sec = v;
        config.decision_cache_ttl_sec = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env var mutation races across tests in the same process; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = load_config(Some(Path::new("/nonexistent/toolhub.toml"))).unwrap();
        assert_eq!(config.max_tools, 25);
    }

    #[test]
    fn env_var_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("HUB_MAX_TOOLS", "10");
        }
        let config = load_config(Some(Path::new("/nonexistent/toolhub.toml"))).unwrap();
        unsafe {
            std::env::remove_var("HUB_MAX_TOOLS");
        }
        assert_eq!(config.max_tools, 10);
    }

    #[test]
    fn file_contents_used_when_env_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = std::env::temp_dir().join(format!("toolhub-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "max_tools = 7\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(config.max_tools, 7);
    }
}
