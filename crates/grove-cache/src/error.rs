pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache management and persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {message}")]
    Json { message: String },

    #[error("incompatible cache schema version: expected {expected}, found {found}")]
    IncompatibleSchemaVersion { expected: u32, found: u32 },
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        // Cache records hold user paths; keep line/column information but never echo
        // string values from the payload.
        Self::Json {
            message: redact_quoted(&err.to_string()),
        }
    }
}

fn redact_quoted(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in message.chars() {
        if in_quotes {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    out.push_str("<redacted>\"");
                    in_quotes = false;
                }
                _ => escaped = false,
            }
            continue;
        }
        out.push(ch);
        if ch == '"' {
            in_quotes = true;
            escaped = false;
        }
    }
    if in_quotes {
        out.push_str("<redacted>");
    }
    out
}
