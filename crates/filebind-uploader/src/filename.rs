//! Stored filename policy
//!
//! The name a file is stored under may differ from the client-supplied one:
//! an optional one-way transform is applied to the stem while the extension
//! is preserved, so type detection by extension keeps working.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Transform applied to a filename stem before storing.
#[derive(Clone, Default)]
pub enum FileNameTransform {
    /// Keep the client-supplied name
    #[default]
    Keep,
    /// Replace the stem with its hex-encoded SHA-256 digest
    Sha256,
    /// Apply a caller-supplied transform to the stem
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl FileNameTransform {
    pub fn apply(&self, stem: &str) -> String {
        match self {
            Self::Keep => stem.to_string(),
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(stem.as_bytes());
                hex::encode(hasher.finalize())
            }
            Self::Custom(f) => f(stem),
        }
    }
}

impl fmt::Debug for FileNameTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "Keep"),
            Self::Sha256 => write!(f, "Sha256"),
            Self::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Compute the stored name for a client-supplied file name.
pub fn stored_name(file_name: &str, transform: &FileNameTransform) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", transform.apply(stem), ext)
        }
        _ => transform.apply(file_name),
    }
}
