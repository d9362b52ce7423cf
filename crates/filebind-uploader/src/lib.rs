//! # filebind-uploader
//!
//! The uploader collaborator used by the lifecycle hooks.
//!
//! ## Features
//!
//! - [`PendingUpload`]: the request-scoped descriptor of a submitted file
//! - [`Uploader`]: the collaborator contract (presence/type/size checks,
//!   persistence, best-effort removal)
//! - [`DiskUploader`]: filesystem implementation backed by `tokio::fs`
//! - Filename policy: optional one-way transform and collision avoidance
//!
//! ## Example
//!
//! ```rust,ignore
//! use filebind_uploader::{DiskUploader, Uploader, UploaderConfig};
//!
//! let uploader = DiskUploader::new(
//!     UploaderConfig::new("/var/app/files")
//!         .allow("pdf", ["application/pdf"])
//!         .max_size(5 * 1024 * 1024),
//! );
//!
//! uploader.check_type(&upload)?;
//! let stored = uploader.process(&upload).await?;
//! ```

pub mod filename;
pub mod upload;
pub mod uploader;

pub use filename::{stored_name, FileNameTransform};
pub use upload::PendingUpload;
pub use uploader::{DiskUploader, UploadError, Uploader, UploaderConfig};
