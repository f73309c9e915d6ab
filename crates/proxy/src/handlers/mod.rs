//! HTTP handlers

pub mod chat;
pub mod completions;
pub mod service;
pub mod types;

use ragrelay_common::errors::AppError;
use validator::Validate;

/// Validate a deserialized request body, mapping failures onto the shared
/// error envelope.
pub(crate) fn validate_body<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(|errors| {
        let field = errors.field_errors().keys().next().map(|k| k.to_string());
        AppError::Validation {
            message: errors.to_string().replace('\n', "; "),
            field,
        }
    })
}
