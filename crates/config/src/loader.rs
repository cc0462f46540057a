use std::{
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::DialtoneConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "dialtone.toml",
    "dialtone.yaml",
    "dialtone.yml",
    "dialtone.json",
];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Use `dir` instead of the user config directory for discovery and saving.
///
/// While set, the project-local `./dialtone.*` files are ignored.
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(dir);
}

pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<DialtoneConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply
/// `DIALTONE_*` environment overrides.
///
/// Returns the defaults when no config file is found or it fails to load.
pub fn discover_and_load() -> DialtoneConfig {
    let config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                DialtoneConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        DialtoneConfig::default()
    };
    apply_env_overrides(drop_zero_timeout(config))
}

/// A zero request timeout would fail every submission; treat it as unset.
/// `config check` still reports it as an error.
fn drop_zero_timeout(mut config: DialtoneConfig) -> DialtoneConfig {
    if config.submission.timeout_secs == Some(0) {
        warn!("ignoring submission.timeout_secs = 0");
        config.submission.timeout_secs = None;
    }
    config
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: the override if set, else
/// `~/.config/dialtone/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "dialtone").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dialtone.toml")
}

/// Write `config` to the discovered (or default) config path.
pub fn save_config(config: &DialtoneConfig) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    save_config_to(&path, config)?;
    Ok(path)
}

/// Write `config` to `path` in the format implied by its extension.
///
/// Creates parent directories if needed.
pub fn save_config_to(path: &Path, config: &DialtoneConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let serialized = match ext {
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| anyhow::anyhow!("serialize config: {e}"))?,
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    };
    std::fs::write(path, serialized)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Load the current config file (or defaults), apply `f`, and save it back.
///
/// Environment overrides are not applied, so they never leak into the file.
pub fn update_config(f: impl FnOnce(&mut DialtoneConfig)) -> anyhow::Result<PathBuf> {
    let path = find_or_default_config_path();
    let mut config = if path.exists() {
        load_config(&path)?
    } else {
        DialtoneConfig::default()
    };
    f(&mut config);
    save_config_to(&path, &config)?;
    Ok(path)
}

/// Apply `DIALTONE_ENDPOINT` and `DIALTONE_TIMEOUT_SECS` on top of `config`.
pub fn apply_env_overrides(config: DialtoneConfig) -> DialtoneConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: DialtoneConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> DialtoneConfig {
    if let Some(endpoint) = lookup("DIALTONE_ENDPOINT").filter(|v| !v.trim().is_empty()) {
        config.submission.endpoint = endpoint.trim().to_string();
    }
    if let Some(raw) = lookup("DIALTONE_TIMEOUT_SECS") {
        match raw.trim().parse::<u64>() {
            Ok(0) => warn!("ignoring DIALTONE_TIMEOUT_SECS=0"),
            Ok(secs) => config.submission.timeout_secs = Some(secs),
            Err(e) => warn!(value = %raw, error = %e, "ignoring invalid DIALTONE_TIMEOUT_SECS"),
        }
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<DialtoneConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
