//! Record view
//!
//! The coordinator never talks to the host ORM's entity directly; it works
//! against this view: the primary key, the submitted data as a JSON object
//! map, and the validation-error accumulator the framework surfaces to the
//! user.

use filebind_core::{Id, Identifiable, ValidationErrors};
use filebind_uploader::PendingUpload;
use serde_json::{Map, Value};

/// The owning record as seen by the lifecycle hooks.
#[derive(Debug, Default, Clone)]
pub struct Record {
    /// Primary key, `None` for unsaved records
    pub id: Option<Id>,
    /// Submitted data, keyed by field name
    pub data: Map<String, Value>,
    /// Validation errors accumulated during the current cycle
    pub errors: ValidationErrors,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: Id) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Set a submitted field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(field.into(), value.into());
        self
    }

    /// Place an upload descriptor under the given file var
    pub fn set_upload(&mut self, file_var: impl Into<String>, upload: &PendingUpload) -> &mut Self {
        // PendingUpload serializes to a plain JSON object
        let value = serde_json::to_value(upload).expect("PendingUpload serializes");
        self.data.insert(file_var.into(), value);
        self
    }

    /// Whether the submitted data contains the file var at all
    pub fn has_file_var(&self, file_var: &str) -> bool {
        self.data.contains_key(file_var)
    }

    /// Extract the upload descriptor from the submitted data.
    ///
    /// Returns `None` when the var is absent or does not deserialize into an
    /// upload descriptor.
    pub fn upload(&self, file_var: &str) -> Option<PendingUpload> {
        self.data
            .get(file_var)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Drop the file var from the submitted data so a later write cannot
    /// overwrite the stored columns with raw upload data.
    pub fn clear_file_var(&mut self, file_var: &str) {
        self.data.remove(file_var);
    }
}

impl Identifiable for Record {
    fn id(&self) -> Option<Id> {
        self.id
    }
}
