/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: login, registration, logout, current user
/// - `projects`: project CRUD and collaborator listing
/// - `tasks`: task CRUD
/// - `users`: user administration

pub mod auth;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod users;

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use validator::ValidationError;

/// Body returned by operations that have nothing else to report
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Distinguishes an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a missing
/// field stays `None`, `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Rejects strings that are empty once surrounding whitespace is dropped
///
/// Names and titles are stored trimmed, so `"   "` must fail like `""`.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("This field is required"));
        return Err(error);
    }
    Ok(())
}
