use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by mailsift stores and segment queries.
///
/// The predicate compiler itself is total and never produces an error; this
/// taxonomy covers the collaborators around it (registry lookup, store I/O,
/// contact mutations).
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Validation failed for one or more fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// No custom field registry is loaded for the organization. Callers must
    /// treat this as a precondition failure, not a zero-result filter.
    #[error("no custom field registry for organization '{organization_id}'")]
    RegistryUnavailable { organization_id: String },

    /// Target contact was not found when performing a mutation.
    #[error("contact not found")]
    NotFound { contact_id: Option<String> },

    /// Invalid input supplied to a store or segment operation.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The `(audienceListId, email)` pair already exists on another contact.
    #[error("duplicate contact: email '{email}' already exists in list '{audience_list_id}' on contact '{existing_contact_id}'")]
    DuplicateContact {
        audience_list_id: String,
        email: String,
        existing_contact_id: String,
    },

    /// Catch-all for response parsing and other store-side surprises.
    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl SegmentError {
    pub(crate) fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: Cow::Owned(message.into()),
        }
    }
}

/// Collection of validation issues encountered while preparing a mutation.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
