use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt as _};
use tracing_subscriber::prelude::*;

/// `[logging]` section of `grove.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A bare level (`debug`, `warning`, ...) or a full filter directive such as
    /// `info,grove.workspace=trace`.
    pub level: String,
    pub json: bool,
    /// Stdout carries the protocol, so stderr is the only console sink.
    pub stderr: bool,
    /// Log file, appended to. Logging continues on the other sinks if it cannot be opened.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Lowercases bare level names and maps `warning` to `warn`; anything else passes through.
    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let level = input.trim();
        if level.is_empty() {
            return "info".to_owned();
        }
        let lower = level.to_ascii_lowercase();
        match lower.as_str() {
            "warning" => "warn".to_owned(),
            "trace" | "debug" | "info" | "warn" | "error" => lower,
            _ => level.to_owned(),
        }
    }

    fn configured_filter(&self) -> EnvFilter {
        EnvFilter::try_new(Self::normalize_level_directives(&self.level))
            .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()))
    }

    /// Filter from the configured level, with `RUST_LOG` directives layered on top when set.
    pub fn env_filter(&self) -> EnvFilter {
        let from_env = std::env::var("RUST_LOG").unwrap_or_default();
        let from_env = from_env.trim();
        if from_env.is_empty() {
            return self.configured_filter();
        }
        let combined = format!(
            "{},{from_env}",
            Self::normalize_level_directives(&self.level)
        );
        EnvFilter::try_new(combined)
            .or_else(|_| EnvFilter::try_new(from_env))
            .unwrap_or_else(|_| self.configured_filter())
    }

    fn open_file(&self) -> Option<File> {
        let path = self.file.as_ref()?;
        OpenOptions::new().create(true).append(true).open(path).ok()
    }

    fn writer(&self, file: Option<File>) -> BoxMakeWriter {
        // `&File` is `Write`, so a shared handle is enough to make writers from.
        let file = file.map(Arc::new);
        match (self.stderr, file) {
            (true, Some(file)) => BoxMakeWriter::new(std::io::stderr.and(file)),
            (false, Some(file)) => BoxMakeWriter::new(file),
            (true, None) => BoxMakeWriter::new(std::io::stderr),
            (false, None) => BoxMakeWriter::new(std::io::sink),
        }
    }
}

/// Installs the process-wide subscriber on the first call.
///
/// Returns `true` only for the call that installed it; repeats and a subscriber installed by
/// someone else both yield `false`.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        installed_now = install(config);
    });
    installed_now
}

fn install(config: &LoggingConfig) -> bool {
    let file = config.open_file();
    let file_missing = config.file.is_some() && file.is_none();
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(config.writer(file))
        .with_ansi(false);
    let fmt: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
        fmt.json().boxed()
    } else {
        fmt.boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if let (true, Some(path)) = (file_missing, config.file.as_ref()) {
        tracing::warn!(
            target: "grove.config",
            path = %path.display(),
            "log file could not be opened; writing to the remaining sinks"
        );
    }
    true
}
