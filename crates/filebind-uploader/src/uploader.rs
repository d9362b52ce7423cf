//! Uploader contract and disk implementation
//!
//! The uploader owns everything that touches file bytes: presence, type and
//! size checks, writing the file into the upload directory and best-effort
//! removal. The lifecycle coordinator only sequences these calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::filename::{stored_name, FileNameTransform};
use crate::upload::PendingUpload;

/// Upload errors
///
/// `Display` renderings double as the user-visible rejection messages the
/// coordinator attaches to the record's file field.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file was uploaded")]
    Missing,
    #[error("The uploaded file could not be read: {0}")]
    Unreadable(String),
    #[error("Files with the extension .{extension} are not allowed")]
    ExtensionNotAllowed { extension: String },
    #[error("Files of type {content_type} are not allowed for .{extension} files")]
    TypeNotAllowed {
        content_type: String,
        extension: String,
    },
    #[error("The file is too large: {size} bytes (maximum is {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Uploader configuration, fixed at construction
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Directory uploaded files are stored in
    pub upload_dir: PathBuf,
    /// Acceptable MIME types per file extension (empty = allow everything)
    pub allowed_types: HashMap<String, Vec<String>>,
    /// Maximum file size in bytes (`None` = unlimited)
    pub max_size: Option<u64>,
    /// Avoid overwriting same-named files by suffixing a counter
    pub unique: bool,
    /// Transform applied to stored filename stems
    pub transform: FileNameTransform,
}

impl UploaderConfig {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            allowed_types: HashMap::new(),
            max_size: None,
            unique: true,
            transform: FileNameTransform::Keep,
        }
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

    pub fn max_size(mut self, max: u64) -> Self {
        self.max_size = Some(max);
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn transform(mut self, transform: FileNameTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Uploader contract required by the lifecycle hooks
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Whether the descriptor carries an actual file
    fn has_upload(&self, upload: &PendingUpload) -> bool;

    /// Check that the spooled temporary file exists and is readable
    async fn check_file(&self, upload: &PendingUpload) -> UploadResult<()>;

    /// Check the upload against the extension/MIME whitelist
    fn check_type(&self, upload: &PendingUpload) -> UploadResult<()>;

    /// Check the upload against the size ceiling
    fn check_size(&self, upload: &PendingUpload) -> UploadResult<()>;

    /// Persist the upload, returning the name it was stored under
    async fn process(&self, upload: &PendingUpload) -> UploadResult<String>;

    /// Best-effort removal of a previously stored file
    async fn remove(&self, file_name: &str);
}

/// Filesystem uploader
pub struct DiskUploader {
    config: UploaderConfig,
}

impl DiskUploader {
    pub fn new(config: UploaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Resolve a stored file name inside the upload directory.
    ///
    /// Rejects anything that could escape the directory.
    fn resolve(&self, file_name: &str) -> UploadResult<PathBuf> {
        if file_name.is_empty()
            || file_name.contains("..")
            || file_name.contains('/')
            || file_name.contains('\\')
        {
            return Err(UploadError::InvalidName(file_name.to_string()));
        }
        Ok(self.config.upload_dir.join(file_name))
    }

    /// Find a name that does not collide with an existing file by suffixing
    /// a counter before the extension: `report.pdf`, `report-1.pdf`, ...
    async fn next_free_name(&self, file_name: &str) -> UploadResult<String> {
        if !fs::try_exists(self.config.upload_dir.join(file_name)).await? {
            return Ok(file_name.to_string());
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (file_name, None),
        };

        for counter in 1u32.. {
            let candidate = match ext {
                Some(ext) => format!("{}-{}.{}", stem, counter, ext),
                None => format!("{}-{}", stem, counter),
            };
            if !fs::try_exists(self.config.upload_dir.join(&candidate)).await? {
                return Ok(candidate);
            }
        }
        unreachable!("counter space exhausted");
    }
}

#[async_trait]
impl Uploader for DiskUploader {
    fn has_upload(&self, upload: &PendingUpload) -> bool {
        upload.is_present()
    }

    async fn check_file(&self, upload: &PendingUpload) -> UploadResult<()> {
        if !self.has_upload(upload) {
            return Err(UploadError::Missing);
        }
        match fs::metadata(&upload.tmp_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(UploadError::Unreadable(format!(
                "{} is not a regular file",
                upload.tmp_path.display()
            ))),
            Err(e) => Err(UploadError::Unreadable(e.to_string())),
        }
    }

    fn check_type(&self, upload: &PendingUpload) -> UploadResult<()> {
        if self.config.allowed_types.is_empty() {
            return Ok(());
        }

        let extension = upload
            .extension()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let allowed = self
            .config
            .allowed_types
            .get(&extension)
            .ok_or_else(|| UploadError::ExtensionNotAllowed {
                extension: extension.clone(),
            })?;

        let content_type = upload.resolved_content_type();
        if allowed
            .iter()
            .any(|mime| mime.eq_ignore_ascii_case(&content_type))
        {
            Ok(())
        } else {
            Err(UploadError::TypeNotAllowed {
                content_type,
                extension,
            })
        }
    }

    fn check_size(&self, upload: &PendingUpload) -> UploadResult<()> {
        match self.config.max_size {
            Some(max) if upload.size > max => Err(UploadError::TooLarge {
                size: upload.size,
                max,
            }),
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, upload), fields(file = %upload.file_name))]
    async fn process(&self, upload: &PendingUpload) -> UploadResult<String> {
        if !self.has_upload(upload) {
            return Err(UploadError::Missing);
        }

        fs::create_dir_all(&self.config.upload_dir).await?;

        let mut name = stored_name(&upload.file_name, &self.config.transform);
        // Validate before touching the filesystem
        self.resolve(&name)?;
        if self.config.unique {
            name = self.next_free_name(&name).await?;
        }

        let dest = self.config.upload_dir.join(&name);
        fs::copy(&upload.tmp_path, &dest).await?;

        debug!(path = ?dest, size = upload.size, "Upload stored");
        Ok(name)
    }

    #[instrument(skip(self))]
    async fn remove(&self, file_name: &str) {
        let path = match self.resolve(file_name) {
            Ok(path) => path,
            Err(e) => {
                warn!(file = file_name, error = %e, "Refusing to remove file");
                return;
            }
        };

        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = ?path, "File removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?path, "File already gone")
            }
            Err(e) => warn!(path = ?path, error = %e, "Failed to remove file"),
        }
    }
}
