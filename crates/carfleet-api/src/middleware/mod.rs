//! # Middleware Stack
//!
//! Request pipeline, outermost first:
//! - [`request_context`]: correlation id, client address, buffered body.
//! - [`access_log`]: one templated `http` line per request.
//! - [`response_log`]: structured response record with the logged body.
//! - [`error_log`]: centralized error handling and the request timeout.

pub mod access_log;
pub mod error_log;
pub mod request_context;
pub mod response_log;
