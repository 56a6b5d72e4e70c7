//! Application directory paths.
//!
//! Data paths (database, exports, logs) default to locations relative to the
//! working directory and are set in the config file. Only the config file
//! itself lives in a platform directory resolved with the [`dirs`] crate.
//!
//! Override with `X402_CONFIG_DIR` for tests or custom deployments.

use std::path::PathBuf;

/// Environment variable that overrides [`config_dir`].
pub const CONFIG_DIR_ENV: &str = "X402_CONFIG_DIR";

/// Config directory.
///
/// Resolves to `dirs::config_dir()/x402-pipeline/` by default.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("x402-pipeline"))
        .unwrap_or_else(|| PathBuf::from(".x402-pipeline"))
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
