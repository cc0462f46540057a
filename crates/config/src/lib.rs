//! Configuration loading, validation and env substitution.
//!
//! Config files: `dialtone.toml`, `dialtone.yaml` or `dialtone.json`,
//! searched in `./` then `~/.config/dialtone/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file text.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load,
        find_or_default_config_path, load_config, save_config, save_config_to, set_config_dir,
        update_config,
    },
    schema::{DialtoneConfig, ResultSource, SubmissionConfig, Theme, UiConfig},
    validate::{Diagnostic, Severity, ValidationResult},
};
