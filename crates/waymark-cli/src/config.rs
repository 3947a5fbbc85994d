//! Configuration vault – reads/writes `~/.waymark/config.toml`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A credential that is wiped from memory on drop and never printed.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(pub String);

impl Secret {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<not set>")
        } else {
            write!(f, "<redacted>")
        }
    }
}

/// Persisted user configuration stored in `~/.waymark/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Robot hostname or IP.
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Default map bundle directory.
    #[serde(default)]
    pub map_path: String,

    /// Velocity limit passed with navigation commands (m/s).
    #[serde(default = "default_velocity_limit")]
    pub velocity_limit: f64,

    /// Named delivery locations: lowercase name → waypoint short code.
    #[serde(default)]
    pub locations: HashMap<String, String>,

    /// Robot API username.
    #[serde(default)]
    pub username: String,

    /// Robot API password (owner-only file permissions are enforced on save;
    /// the value is zeroized on drop and redacted in Debug output).
    #[serde(default, skip_serializing_if = "Secret::is_empty")]
    pub password: Secret,
}

fn default_hostname() -> String {
    "192.168.80.3".to_string()
}

fn default_velocity_limit() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            map_path: String::new(),
            velocity_limit: default_velocity_limit(),
            locations: HashMap::new(),
            username: String::new(),
            password: Secret::default(),
        }
    }
}

/// Return the path to `~/.waymark/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".waymark").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `WAYMARK_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `WAYMARK_HOSTNAME` | `hostname` |
/// | `WAYMARK_MAP_PATH` | `map_path` |
/// | `WAYMARK_VELOCITY_LIMIT` | `velocity_limit` |
/// | `WAYMARK_USERNAME` | `username` |
/// | `WAYMARK_PASSWORD` | `password` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("WAYMARK_HOSTNAME") {
        cfg.hostname = v;
    }
    if let Ok(v) = std::env::var("WAYMARK_MAP_PATH") {
        cfg.map_path = v;
    }
    if let Ok(v) = std::env::var("WAYMARK_VELOCITY_LIMIT")
        && let Ok(limit) = v.parse::<f64>()
    {
        cfg.velocity_limit = limit;
    }
    if let Ok(v) = std::env::var("WAYMARK_USERNAME") {
        cfg.username = v;
    }
    if let Ok(v) = std::env::var("WAYMARK_PASSWORD") {
        cfg.password = Secret(v);
    }
}

/// Save the config to disk, creating `~/.waymark/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Write the file with owner-only read/write (rw-------) on Unix; the
    // password lives in this file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
