//! Configuration file loading
//!
//! Settings resolve in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (fallback)
//!
//! This module provides the file-level helpers; each crate defines its own
//! typed config struct and environment override names.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Get the platform configuration file path for the given file name
///
/// - Linux: `~/.config/mrp/<file>` if present, else `/etc/mrp/<file>` if
///   present, else the user path (for first-time writes)
/// - macOS: `~/Library/Application Support/mrp/<file>`
/// - Windows: `%APPDATA%\mrp\<file>`
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let user = dirs::config_dir().map(|d| d.join("mrp").join(file_name));
        if let Some(path) = &user {
            if path.exists() {
                return user;
            }
        }
        let system = PathBuf::from("/etc/mrp").join(file_name);
        if system.exists() {
            return Some(system);
        }
        user
    } else {
        dirs::config_dir().map(|d| d.join("mrp").join(file_name))
    }
}

/// Read a TOML config file into `T`. A missing file yields `T::default()`.
pub fn read_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write `config` as TOML. Writes a temp file first, then renames, so a
/// crash mid-write cannot leave a truncated config behind.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Non-empty environment variable override
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
