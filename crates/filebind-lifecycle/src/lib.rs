//! # filebind-lifecycle
//!
//! Binds file uploads to database records through the host framework's model
//! lifecycle: validate the incoming file before the record validates, persist
//! it after the record saves, and clean up stored files when the record is
//! replaced or deleted.
//!
//! One [`UploadCoordinator`] is constructed per model type; it owns its
//! configuration and uploader instead of registering them in any process-wide
//! state. The pre-hooks return a [`PendingDeletions`] value that the caller
//! threads into the matching post-hook, so no bookkeeping is bolted onto the
//! record itself.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use filebind_lifecycle::{AttachmentConfig, MemoryRecordStore, UploadCoordinator};
//!
//! let config = AttachmentConfig::default()
//!     .upload_dir("files")
//!     .allow("pdf", ["application/pdf"])
//!     .required(true);
//! let coordinator = UploadCoordinator::new(config, Arc::new(MemoryRecordStore::new()))?;
//!
//! // Wired into the host model's hooks:
//! if coordinator.before_validate(&mut record).await {
//!     let pending = coordinator.before_save(&record).await;
//!     // ... framework saves the record ...
//!     let outcome = coordinator.after_save(&mut record, pending, true).await;
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod record;
pub mod store;

pub use config::{AttachmentConfig, ConfigError, FieldMap};
pub use coordinator::{AttachmentMetadata, PendingDeletions, UploadCoordinator};
pub use record::Record;
pub use store::{MemoryRecordStore, RecordStore, StoreError, StoreResult};
