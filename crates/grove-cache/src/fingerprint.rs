use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stable SHA-256 fingerprint stored as a lowercase hex string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes.as_ref());
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint of a sequence of parts, order-independent and ignoring duplicates.
    ///
    /// Parts are sorted, deduplicated and length-prefixed before hashing, so `["ab", "c"]` and
    /// `["a", "bc"]` never collide.
    pub fn from_unordered<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts: Vec<String> = parts
            .into_iter()
            .map(|part| part.as_ref().to_owned())
            .collect();
        parts.sort();
        parts.dedup();

        let mut hasher = Sha256::new();
        for part in &parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Fingerprint of a path's textual form. Callers normalize the path first.
    pub fn for_path(path: &Path) -> Self {
        Self::from_bytes(path.to_string_lossy().as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading `len` hex characters, for file names and log fields.
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
