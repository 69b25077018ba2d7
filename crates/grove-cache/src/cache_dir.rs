use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "GROVE_CACHE_DIR";

/// Selects the cache root: an explicit override, then `GROVE_CACHE_DIR`, then
/// `~/.grove/cache`.
pub fn cache_root(override_dir: Option<&Path>) -> Result<PathBuf, CacheError> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    match std::env::var_os(CACHE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => default_cache_root(),
    }
}

pub fn default_cache_root() -> Result<PathBuf, CacheError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".grove").join("cache"))
}
