//! Configuration and logging setup for Grove.
//!
//! Configuration is a single TOML document (`grove.toml` in the workspace root). Every section
//! is optional and falls back to defaults tuned for editor latency.

mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{init_tracing, LoggingConfig};

/// File name looked up by [`load_for_workspace`].
pub const CONFIG_FILE_NAME: &str = "grove.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroveConfig {
    pub logging: LoggingConfig,
    pub compile: CompileConfig,
    pub documents: DocumentsConfig,
    pub classpath: ClasspathConfig,
}

/// Limits steering the incremental/full compile decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Largest changed-file count that may still take the incremental path.
    pub max_incremental_changes: usize,
    /// Largest incremental working set before falling back to a full compile.
    pub max_working_set: usize,
    /// Forward dependency depth pulled into an incremental working set.
    pub forward_depth: u32,
    /// Maximum number of project source files admitted into a full compilation unit.
    pub max_compile_files: usize,
    /// Source file extensions (without the dot) admitted into compilation units.
    pub source_extensions: Vec<String>,
    /// Worker threads used for background compiles. `0` picks a default.
    pub worker_threads: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            max_incremental_changes: 3,
            max_working_set: 50,
            forward_depth: 2,
            max_compile_files: 1_000,
            source_extensions: vec!["groovy".to_owned(), "java".to_owned()],
            worker_threads: 0,
        }
    }
}

impl CompileConfig {
    /// Worker thread count with `0` resolved against the host: one less than the available
    /// cores, between 1 and 4.
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available.saturating_sub(1).clamp(1, 4)
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.source_extensions.iter().any(|allowed| allowed == ext))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// How long the last known contents of a closed document are served from memory.
    pub closed_file_ttl_ms: u64,
    /// Maximum number of closed-file entries kept in memory.
    pub closed_file_capacity: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            closed_file_ttl_ms: 5_000,
            closed_file_capacity: 256,
        }
    }
}

impl DocumentsConfig {
    pub fn closed_file_ttl(&self) -> Duration {
        Duration::from_millis(self.closed_file_ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClasspathConfig {
    /// Override for the cache directory. When unset, `GROVE_CACHE_DIR` and then
    /// `~/.grove/cache` are used.
    pub cache_dir: Option<PathBuf>,
    /// Number of classpath entries spot-checked for existence when validating a cache entry.
    pub sample_size: usize,
    /// Build files whose stamps gate a project's cached classpath.
    pub build_file_names: Vec<String>,
}

impl Default for ClasspathConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            sample_size: 3,
            build_file_names: [
                "build.gradle",
                "build.gradle.kts",
                "settings.gradle",
                "settings.gradle.kts",
                "gradle.properties",
                "pom.xml",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

/// A non-fatal problem found while validating a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub path: &'static str,
    pub message: String,
}

impl GroveConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks values that parse fine but cannot work as intended.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.compile.max_working_set == 0 {
            warnings.push(ConfigWarning {
                path: "compile.max_working_set",
                message: "0 disables incremental compilation entirely".to_owned(),
            });
        }
        if self.compile.max_compile_files == 0 {
            warnings.push(ConfigWarning {
                path: "compile.max_compile_files",
                message: "0 admits only open documents into full compiles".to_owned(),
            });
        }
        if self.compile.source_extensions.is_empty() {
            warnings.push(ConfigWarning {
                path: "compile.source_extensions",
                message: "no source extensions configured; project files will never compile"
                    .to_owned(),
            });
        }
        if self.classpath.build_file_names.is_empty() {
            warnings.push(ConfigWarning {
                path: "classpath.build_file_names",
                message: "no build files configured; projects cannot be discovered".to_owned(),
            });
        }
        if let Err(err) = tracing_subscriber::EnvFilter::try_new(
            LoggingConfig::normalize_level_directives(&self.logging.level),
        ) {
            warnings.push(ConfigWarning {
                path: "logging.level",
                message: format!("invalid filter directive ({err}); falling back to `info`"),
            });
        }
        warnings
    }
}

/// Load the Grove configuration for a workspace root.
///
/// If no config is present, returns [`GroveConfig::default`] and `None`.
pub fn load_for_workspace(
    workspace_root: &Path,
) -> Result<(GroveConfig, Option<PathBuf>), ConfigError> {
    let path = workspace_root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok((GroveConfig::default(), None));
    }
    let config = GroveConfig::load(&path)?;
    Ok((config, Some(path)))
}
