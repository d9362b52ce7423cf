//! Pending upload descriptor

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file submitted alongside a record, not yet persisted.
///
/// Extracted from the record's submitted data for the duration of one
/// validate/save cycle and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingUpload {
    /// Client-supplied file name
    pub file_name: String,
    /// Size in bytes
    pub size: u64,
    /// Submitted MIME type (may be empty)
    pub content_type: String,
    /// Temporary path where the request body was spooled
    pub tmp_path: PathBuf,
}

impl PendingUpload {
    pub fn new(
        file_name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
        tmp_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            size,
            content_type: content_type.into(),
            tmp_path: tmp_path.into(),
        }
    }

    /// Whether this descriptor actually carries a file.
    ///
    /// Browsers submit the file field even when nothing was selected; such
    /// placeholders arrive with an empty name and zero size.
    pub fn is_present(&self) -> bool {
        !self.file_name.is_empty() && self.size > 0
    }

    /// File extension of the client-supplied name, if any
    pub fn extension(&self) -> Option<&str> {
        if !self.file_name.contains('.') {
            return None;
        }
        self.file_name
            .rsplit('.')
            .next()
            .filter(|ext| !ext.is_empty() && ext.len() <= 10)
    }

    /// The submitted MIME type, falling back to a guess from the file name
    /// when the client sent none.
    pub fn resolved_content_type(&self) -> String {
        if !self.content_type.is_empty() {
            return self.content_type.clone();
        }
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .to_string()
    }
}
