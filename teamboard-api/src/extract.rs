/// Request extractors that reject with [`ApiError`]
///
/// axum's own `Json` and `Query` answer malformed input with plain-text
/// bodies. These wrappers run the same extraction and convert the rejection,
/// so every error response keeps the `{ "error", "message", "details"? }`
/// shape.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
