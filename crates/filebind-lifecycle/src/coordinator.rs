//! Upload coordinator
//!
//! Sequences the five lifecycle hooks around one file attachment per record:
//!
//! - `before_validate`: run the uploader's checks, attach field errors
//! - `before_save`: remember the currently stored file of an updated record
//! - `after_save`: persist the upload, record its metadata, clean up
//! - `before_delete` / `after_delete`: remove the record's stored file
//!
//! A record's current file is deleted only after the replacement metadata
//! save succeeded; a freshly written file is deleted again whenever that save
//! fails. Nothing is retried.

use std::sync::Arc;

use filebind_core::{HookResult, Identifiable};
use filebind_uploader::{DiskUploader, Uploader};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::{AttachmentConfig, ConfigError, FieldMap};
use crate::record::Record;
use crate::store::RecordStore;

/// Metadata recorded on the owning record after a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    /// Name the file was stored under
    pub file_name: String,
    /// Client-supplied file name
    pub real_name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub content_type: String,
}

impl AttachmentMetadata {
    /// Map the metadata onto the configured destination columns
    fn columns(&self, fields: &FieldMap) -> Map<String, Value> {
        let mut columns = Map::new();
        columns.insert(fields.name.clone(), Value::from(self.file_name.clone()));
        columns.insert(fields.real_name.clone(), Value::from(self.real_name.clone()));
        columns.insert(fields.size.clone(), Value::from(self.size));
        columns.insert(
            fields.content_type.clone(),
            Value::from(self.content_type.clone()),
        );
        columns
    }
}

/// Files marked for removal once the compensating save/delete succeeds.
///
/// Produced by `before_save`/`before_delete` and consumed by the matching
/// post-hook of the same lifecycle invocation.
#[derive(Debug, Default)]
pub struct PendingDeletions {
    files: Vec<String>,
}

impl PendingDeletions {
    pub fn push(&mut self, file_name: impl Into<String>) {
        self.files.push(file_name.into());
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    fn into_files(self) -> Vec<String> {
        self.files
    }
}

/// Coordinates validation, persistence and cleanup of one file attachment
/// per record. One instance per model type.
pub struct UploadCoordinator<S: RecordStore, U: Uploader = DiskUploader> {
    config: AttachmentConfig,
    uploader: U,
    store: Arc<S>,
}

impl<S: RecordStore> UploadCoordinator<S, DiskUploader> {
    /// Build a coordinator with a disk uploader derived from the config
    pub fn new(config: AttachmentConfig, store: Arc<S>) -> Result<Self, ConfigError> {
        config.validate()?;
        let uploader = DiskUploader::new(config.uploader_config());
        Ok(Self {
            config,
            uploader,
            store,
        })
    }
}

impl<S: RecordStore, U: Uploader> UploadCoordinator<S, U> {
    /// Build a coordinator with a custom uploader
    pub fn with_uploader(
        config: AttachmentConfig,
        uploader: U,
        store: Arc<S>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            uploader,
            store,
        })
    }

    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    /// Pre-validate hook.
    ///
    /// Runs the uploader's file/type/size checks when an upload is present
    /// and records every failure as a field-level error under the file var.
    /// A missing upload only fails when the attachment is required. Returns
    /// whether the file field passed.
    pub async fn before_validate(&self, record: &mut Record) -> bool {
        let file_var = self.config.file_var.clone();

        if record.has_file_var(&file_var) {
            match record.upload(&file_var) {
                Some(upload) if self.uploader.has_upload(&upload) => {
                    if let Err(e) = self.uploader.check_file(&upload).await {
                        record.errors.add(&file_var, e.to_string());
                    }
                    if let Err(e) = self.uploader.check_type(&upload) {
                        record.errors.add(&file_var, e.to_string());
                    }
                    if let Err(e) = self.uploader.check_size(&upload) {
                        record.errors.add(&file_var, e.to_string());
                    }
                }
                // The field was submitted but holds no actual file
                _ => {
                    if self.config.required {
                        record.errors.add(&file_var, "Select a file to upload");
                    }
                }
            }
        } else if self.config.required {
            record.errors.add(&file_var, "No file was uploaded");
        }

        !record.errors.has_error(&file_var)
    }

    /// Pre-save hook.
    ///
    /// For an already persisted record, reads the currently stored file name
    /// into the pending-deletion list so `after_save` can remove it once the
    /// replacement is durable. The record's submitted data is not touched.
    #[instrument(skip(self, record), fields(id = ?record.id()))]
    pub async fn before_save(&self, record: &Record) -> PendingDeletions {
        let mut pending = PendingDeletions::default();
        let Some(id) = record.id() else {
            return pending;
        };

        match self
            .store
            .stored_file_name(id, &self.config.fields.name)
            .await
        {
            Ok(Some(name)) if !name.is_empty() => {
                debug!(id, file = %name, "Current file queued for replacement");
                pending.push(name);
            }
            Ok(_) => {}
            // Fail toward an orphaned disk file, never toward data loss
            Err(e) => warn!(id, error = %e, "Could not read current file name"),
        }

        pending
    }

    /// Post-save hook.
    ///
    /// Persists a present upload, records its metadata on the owning record
    /// (without re-running callbacks) and only then drains the
    /// pending-deletion list. When the metadata save fails the just-written
    /// file is removed so nothing is orphaned. Returns the recorded metadata,
    /// or `None` when no upload was submitted.
    #[instrument(skip(self, record, pending), fields(id = ?record.id()))]
    pub async fn after_save(
        &self,
        record: &mut Record,
        pending: PendingDeletions,
        created: bool,
    ) -> HookResult<Option<AttachmentMetadata>> {
        let file_var = self.config.file_var.clone();

        if !record.has_file_var(&file_var) {
            return HookResult::success(None);
        }

        let upload = match record.upload(&file_var) {
            Some(upload) if self.uploader.has_upload(&upload) => upload,
            // Submitted but empty: drop the var so the stored columns are
            // not overwritten with empty values
            _ => {
                record.clear_file_var(&file_var);
                return HookResult::success(None);
            }
        };

        let stored = match self.uploader.process(&upload).await {
            Ok(name) => name,
            Err(e) => return HookResult::failure_with_error(&file_var, e.to_string()),
        };

        let Some(id) = record.id() else {
            self.uploader.remove(&stored).await;
            return HookResult::failure_with_base_error(
                "Cannot attach a file to a record without an id",
            );
        };

        let metadata = AttachmentMetadata {
            file_name: stored.clone(),
            real_name: upload.file_name.clone(),
            size: upload.size,
            content_type: upload.resolved_content_type(),
        };

        match self
            .store
            .save_metadata(id, &metadata.columns(&self.config.fields))
            .await
        {
            Ok(()) => {
                for old in pending.into_files() {
                    // With unique disabled a replacement may reuse the old
                    // name; the stored file must survive the cleanup
                    if old != stored {
                        self.uploader.remove(&old).await;
                    }
                }
                record.clear_file_var(&file_var);
                info!(id, file = %metadata.file_name, created, "Attachment saved");
                HookResult::success(Some(metadata))
            }
            Err(e) => {
                self.uploader.remove(&stored).await;
                warn!(id, error = %e, "Metadata save failed, uploaded file removed");
                HookResult::failure_with_base_error(format!(
                    "Could not save attachment metadata: {}",
                    e
                ))
            }
        }
    }

    /// Pre-delete hook.
    ///
    /// Reads the record's stored file name into the pending-deletion list.
    #[instrument(skip(self, record), fields(id = ?record.id()))]
    pub async fn before_delete(&self, record: &Record, _cascade: bool) -> PendingDeletions {
        let mut pending = PendingDeletions::default();
        let Some(id) = record.id() else {
            return pending;
        };

        match self
            .store
            .stored_file_name(id, &self.config.fields.name)
            .await
        {
            Ok(Some(name)) if !name.is_empty() => pending.push(name),
            Ok(_) => {}
            Err(e) => warn!(id, error = %e, "Could not read current file name"),
        }

        pending
    }

    /// Post-delete hook.
    ///
    /// Best-effort removal of every file queued by `before_delete`.
    pub async fn after_delete(&self, pending: PendingDeletions) {
        for file in pending.into_files() {
            self.uploader.remove(&file).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use filebind_uploader::PendingUpload;
    use serde_json::json;
    use std::path::PathBuf;
    use tokio::fs;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("filebind-lifecycle-{}", Uuid::new_v4()))
    }

    async fn spool(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("filebind-spool-{}", Uuid::new_v4()));
        fs::write(&path, contents).await.unwrap();
        path
    }

    async fn upload(file_name: &str, content_type: &str, contents: &str) -> PendingUpload {
        let tmp = spool(contents).await;
        PendingUpload::new(file_name, contents.len() as u64, content_type, tmp)
    }

    fn base_config(dir: &PathBuf) -> AttachmentConfig {
        AttachmentConfig::default()
            .upload_dir(dir.clone())
            .allow("txt", ["text/plain"])
            .allow("pdf", ["application/pdf"])
    }

    fn coordinator(
        config: AttachmentConfig,
        store: Arc<MemoryRecordStore>,
    ) -> UploadCoordinator<MemoryRecordStore> {
        UploadCoordinator::new(config, store).unwrap()
    }

    async fn files_in(dir: &PathBuf) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return names;
        };
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_required_without_file_fails_validation() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir).required(true), store);

        let mut record = Record::new();
        assert!(!coordinator.before_validate(&mut record).await);
        assert_eq!(
            record.errors.get("file").unwrap(),
            &vec!["No file was uploaded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_required_with_empty_upload_fails_validation() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir).required(true), store);

        let mut record = Record::new();
        record.set_upload("file", &PendingUpload::new("", 0, "", ""));

        assert!(!coordinator.before_validate(&mut record).await);
        assert_eq!(
            record.errors.get("file").unwrap(),
            &vec!["Select a file to upload".to_string()]
        );
    }

    #[tokio::test]
    async fn test_optional_without_file_passes_validation() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir), store);

        let mut record = Record::new();
        assert!(coordinator.before_validate(&mut record).await);
        assert!(record.errors.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_type_fails_and_writes_nothing() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir), store);

        let mut record = Record::new();
        let bad = upload("script.exe", "application/x-msdownload", "MZ").await;
        record.set_upload("file", &bad);

        assert!(!coordinator.before_validate(&mut record).await);
        assert!(record.errors.has_error("file"));
        assert!(files_in(&dir).await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_fails_validation() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir).max_size(4), store);

        let mut record = Record::new();
        record.set_upload("file", &upload("note.txt", "text/plain", "longer than four").await);

        assert!(!coordinator.before_validate(&mut record).await);
        let messages = record.errors.get("file").unwrap();
        assert!(messages.iter().any(|m| m.contains("too large")));
    }

    #[tokio::test]
    async fn test_round_trip_create() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(1, Map::new()).await;
        let coordinator = coordinator(base_config(&dir), store.clone());

        let mut record = Record::with_id(1);
        record.set_upload("file", &upload("report.pdf", "application/pdf", "pdf bytes").await);

        assert!(coordinator.before_validate(&mut record).await);
        let pending = coordinator.before_save(&record).await;
        assert!(pending.is_empty());

        let result = coordinator.after_save(&mut record, pending, true).await;
        assert!(result.is_success());
        let metadata = result.result().unwrap().as_ref().unwrap();
        assert_eq!(metadata.file_name, "report.pdf");
        assert_eq!(metadata.real_name, "report.pdf");
        assert_eq!(metadata.size, 9);
        assert_eq!(metadata.content_type, "application/pdf");

        // Exactly one file on disk, columns populated, file var cleared
        assert_eq!(files_in(&dir).await, vec!["report.pdf".to_string()]);
        let row = store.row(1).await.unwrap();
        assert_eq!(row["file_name"], "report.pdf");
        assert_eq!(row["file_real_name"], "report.pdf");
        assert_eq!(row["file_size"], 9);
        assert_eq!(row["file_type"], "application/pdf");
        assert!(!record.has_file_var("file"));
    }

    #[tokio::test]
    async fn test_replacement_removes_old_file_after_save() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(
                1,
                [("file_name".to_string(), json!("old.txt"))]
                    .into_iter()
                    .collect(),
            )
            .await;

        let coordinator = coordinator(base_config(&dir), store.clone());

        // Seed the previously stored file on disk
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("old.txt"), "old contents").await.unwrap();

        let mut record = Record::with_id(1);
        record.set_upload("file", &upload("new.txt", "text/plain", "new contents").await);

        let pending = coordinator.before_save(&record).await;
        assert_eq!(pending.len(), 1);

        let result = coordinator.after_save(&mut record, pending, false).await;
        assert!(result.is_success());

        assert_eq!(files_in(&dir).await, vec!["new.txt".to_string()]);
        let row = store.row(1).await.unwrap();
        assert_eq!(row["file_name"], "new.txt");
    }

    #[tokio::test]
    async fn test_metadata_failure_removes_new_file_and_keeps_old() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(
                1,
                [("file_name".to_string(), json!("old.txt"))]
                    .into_iter()
                    .collect(),
            )
            .await;

        let coordinator = coordinator(base_config(&dir), store.clone());

        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("old.txt"), "old contents").await.unwrap();

        let mut record = Record::with_id(1);
        record.set_upload("file", &upload("new.txt", "text/plain", "new contents").await);

        let pending = coordinator.before_save(&record).await;
        store.fail_next_save();

        let result = coordinator.after_save(&mut record, pending, false).await;
        assert!(result.is_failure());

        // The new file is gone, the old one survives, the row is untouched
        assert_eq!(files_in(&dir).await, vec!["old.txt".to_string()]);
        let row = store.row(1).await.unwrap();
        assert_eq!(row["file_name"], "old.txt");
    }

    #[tokio::test]
    async fn test_replacement_with_same_name_keeps_stored_file() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(
                1,
                [("file_name".to_string(), json!("report.txt"))]
                    .into_iter()
                    .collect(),
            )
            .await;

        // unique disabled: the replacement overwrites the same name
        let coordinator = coordinator(base_config(&dir).unique(false), store.clone());

        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("report.txt"), "v1").await.unwrap();

        let mut record = Record::with_id(1);
        record.set_upload("file", &upload("report.txt", "text/plain", "v2").await);

        let pending = coordinator.before_save(&record).await;
        let result = coordinator.after_save(&mut record, pending, false).await;
        assert!(result.is_success());

        assert_eq!(files_in(&dir).await, vec!["report.txt".to_string()]);
        assert_eq!(
            fs::read_to_string(dir.join("report.txt")).await.unwrap(),
            "v2"
        );
    }

    #[tokio::test]
    async fn test_after_save_without_upload_clears_var() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(1, Map::new()).await;
        let coordinator = coordinator(base_config(&dir), store.clone());

        let mut record = Record::with_id(1);
        record.set_upload("file", &PendingUpload::new("", 0, "", ""));

        let result = coordinator
            .after_save(&mut record, PendingDeletions::default(), false)
            .await;
        assert!(result.is_success());
        assert!(result.result().unwrap().is_none());
        assert!(!record.has_file_var("file"));
        assert!(store.row(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_after_save_without_file_var_is_noop() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir), store);

        let mut record = Record::with_id(1);
        let result = coordinator
            .after_save(&mut record, PendingDeletions::default(), true)
            .await;
        assert!(result.is_success());
        assert!(result.result().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_after_save_without_id_fails_and_cleans_up() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        let coordinator = coordinator(base_config(&dir), store);

        let mut record = Record::new();
        record.set_upload("file", &upload("note.txt", "text/plain", "hi").await);

        let result = coordinator
            .after_save(&mut record, PendingDeletions::default(), true)
            .await;
        assert!(result.is_failure());
        assert!(files_in(&dir).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_stored_file() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store
            .insert(
                1,
                [("file_name".to_string(), json!("doomed.txt"))]
                    .into_iter()
                    .collect(),
            )
            .await;

        let coordinator = coordinator(base_config(&dir), store);

        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("doomed.txt"), "bye").await.unwrap();

        let record = Record::with_id(1);
        let pending = coordinator.before_delete(&record, false).await;
        assert_eq!(pending.len(), 1);

        coordinator.after_delete(pending).await;
        assert!(files_in(&dir).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_file_is_noop() {
        let dir = temp_dir();
        let store = Arc::new(MemoryRecordStore::new());
        store.insert(1, Map::new()).await;
        let coordinator = coordinator(base_config(&dir), store);

        let record = Record::with_id(1);
        let pending = coordinator.before_delete(&record, false).await;
        assert!(pending.is_empty());

        // Draining an empty list must not error or touch the filesystem
        coordinator.after_delete(pending).await;
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let store = Arc::new(MemoryRecordStore::new());
        let config = AttachmentConfig::default().file_var("");
        assert!(UploadCoordinator::new(config, store).is_err());
    }
}
