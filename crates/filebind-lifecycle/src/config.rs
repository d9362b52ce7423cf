//! Attachment configuration
//!
//! One configuration per model type, validated when the coordinator is
//! constructed and immutable afterwards.

use std::collections::HashMap;
use std::path::PathBuf;

use filebind_uploader::{FileNameTransform, UploaderConfig};
use thiserror::Error;

/// Configuration errors, raised at coordinator construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("file_var must not be empty")]
    EmptyFileVar,
    #[error("upload_dir must not be empty")]
    EmptyUploadDir,
    #[error("field mapping contains an empty column name")]
    EmptyFieldColumn,
    #[error("webroot must be an absolute path when force_webroot is set")]
    RelativeWebroot,
}

/// Destination columns for the recorded metadata
#[derive(Debug, Clone)]
pub struct FieldMap {
    /// Column holding the stored file name
    pub name: String,
    /// Column holding the client-supplied file name
    pub real_name: String,
    /// Column holding the file size in bytes
    pub size: String,
    /// Column holding the MIME type
    pub content_type: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            name: "file_name".to_string(),
            real_name: "file_real_name".to_string(),
            size: "file_size".to_string(),
            content_type: "file_type".to_string(),
        }
    }
}

impl FieldMap {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || self.real_name.is_empty()
            || self.size.is_empty()
            || self.content_type.is_empty()
        {
            return Err(ConfigError::EmptyFieldColumn);
        }
        Ok(())
    }
}

/// Per-model-type attachment configuration
#[derive(Debug, Clone)]
pub struct AttachmentConfig {
    /// Directory uploaded files are stored in
    pub upload_dir: PathBuf,
    /// Resolve `upload_dir` under `webroot`
    pub force_webroot: bool,
    /// Web root used when `force_webroot` is set
    pub webroot: PathBuf,
    /// Submitted-data key holding the raw upload
    pub file_var: String,
    /// Destination columns for the recorded metadata
    pub fields: FieldMap,
    /// Acceptable MIME types per file extension (empty = allow everything)
    pub allowed_types: HashMap<String, Vec<String>>,
    /// Reject records submitted without a file
    pub required: bool,
    /// Avoid overwriting same-named files
    pub unique: bool,
    /// Maximum file size in bytes
    pub max_size: Option<u64>,
    /// Transform applied to stored filename stems
    pub transform: FileNameTransform,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("files"),
            force_webroot: false,
            webroot: PathBuf::new(),
            file_var: "file".to_string(),
            fields: FieldMap::default(),
            allowed_types: HashMap::new(),
            required: false,
            unique: true,
            max_size: None,
            transform: FileNameTransform::Keep,
        }
    }
}

impl AttachmentConfig {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Resolve the upload directory under the given web root
    pub fn force_webroot(mut self, webroot: impl Into<PathBuf>) -> Self {
        self.force_webroot = true;
        self.webroot = webroot.into();
        self
    }

    pub fn file_var(mut self, var: impl Into<String>) -> Self {
        self.file_var = var.into();
        self
    }

    pub fn fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }

    /// Allow a MIME type list for an extension
    pub fn allow<I, S>(mut self, extension: impl Into<String>, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types.insert(
            extension.into().to_ascii_lowercase(),
            mime_types.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn max_size(mut self, max: u64) -> Self {
        self.max_size = Some(max);
        self
    }

    pub fn transform(mut self, transform: FileNameTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file_var.is_empty() {
            return Err(ConfigError::EmptyFileVar);
        }
        if self.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyUploadDir);
        }
        if self.force_webroot && !self.webroot.is_absolute() {
            return Err(ConfigError::RelativeWebroot);
        }
        self.fields.validate()
    }

    /// The directory files end up in, with `force_webroot` applied
    pub fn resolved_upload_dir(&self) -> PathBuf {
        if self.force_webroot {
            self.webroot.join(&self.upload_dir)
        } else {
            self.upload_dir.clone()
        }
    }

    /// Derive the uploader configuration for this model type
    pub fn uploader_config(&self) -> UploaderConfig {
        let mut config = UploaderConfig::new(self.resolved_upload_dir())
            .unique(self.unique)
            .transform(self.transform.clone());
        config.allowed_types = self.allowed_types.clone();
        config.max_size = self.max_size;
        config
    }
}
