//! # filebind-core
//!
//! Core types and utilities shared by the filebind crates:
//! - Validation error collection ([`ValidationErrors`])
//! - Lifecycle hook result type ([`HookResult`])
//! - Record identity traits ([`Identifiable`])

pub mod error;
pub mod result;
pub mod traits;

pub use error::ValidationErrors;
pub use result::HookResult;
pub use traits::{Id, Identifiable};
