//! # Extraction Helpers
//!
//! Maps extractor rejections onto [`ApiError`] so malformed input flows
//! through the centralized error handler like any other failure.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::ApiError;

/// Extract a JSON body, mapping rejections to a 400 operational error.
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., ApiError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| ApiError::bad_request(err.body_text()))
}
