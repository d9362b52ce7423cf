//! Lifecycle hook result type
//!
//! Hooks never raise for recoverable conditions; every outcome is carried in
//! a [`HookResult`] so callers can branch on success and inspect the
//! accumulated errors.

use crate::error::ValidationErrors;
use std::fmt;

/// The outcome of one lifecycle hook invocation.
#[derive(Debug)]
pub struct HookResult<T> {
    /// Whether the hook succeeded
    success: bool,
    /// The result value (if successful)
    result: Option<T>,
    /// Errors from the hook
    errors: ValidationErrors,
    /// Optional message for display
    message: Option<String>,
}

impl<T> HookResult<T> {
    /// Create a successful result
    pub fn success(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            errors: ValidationErrors::new(),
            message: None,
        }
    }

    /// Create a failed result
    pub fn failure(errors: ValidationErrors) -> Self {
        Self {
            success: false,
            result: None,
            errors,
            message: None,
        }
    }

    /// Create a failed result with a single field error
    pub fn failure_with_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        Self::failure(errors)
    }

    /// Create a failed result with a base error
    pub fn failure_with_base_error(message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add_base(message);
        Self::failure(errors)
    }

    /// Check if the hook succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Check if the hook failed
    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// Get the result (if successful)
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Take the result (consuming it)
    pub fn take_result(&mut self) -> Option<T> {
        self.result.take()
    }

    /// Get the errors
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Get the message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Set the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Full error messages
    pub fn full_messages(&self) -> Vec<String> {
        self.errors.full_messages()
    }

    /// Map the result if successful
    pub fn map<U, F>(self, f: F) -> HookResult<U>
    where
        F: FnOnce(T) -> U,
    {
        HookResult {
            success: self.success,
            result: self.result.map(f),
            errors: self.errors,
            message: self.message,
        }
    }

    /// Chain with another hook call if successful
    pub fn and_then<U, F>(self, f: F) -> HookResult<U>
    where
        F: FnOnce(T) -> HookResult<U>,
    {
        if self.success {
            match self.result {
                Some(result) => f(result),
                None => HookResult::failure(self.errors),
            }
        } else {
            HookResult::failure(self.errors)
        }
    }
}

impl<T> From<Result<T, ValidationErrors>> for HookResult<T> {
    fn from(result: Result<T, ValidationErrors>) -> Self {
        match result {
            Ok(value) => HookResult::success(value),
            Err(errors) => HookResult::failure(errors),
        }
    }
}

impl<T> From<HookResult<T>> for Result<T, ValidationErrors> {
    fn from(result: HookResult<T>) -> Self {
        if result.success {
            result.result.ok_or_else(|| {
                let mut errors = ValidationErrors::new();
                errors.add_base("hook succeeded but no result was returned");
                errors
            })
        } else {
            Err(result.errors)
        }
    }
}

impl<T: fmt::Display> fmt::Display for HookResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            match self.result {
                Some(ref result) => write!(f, "Success: {}", result),
                None => write!(f, "Success"),
            }
        } else {
            write!(f, "Failure: {}", self.errors.full_messages().join(", "))
        }
    }
}
