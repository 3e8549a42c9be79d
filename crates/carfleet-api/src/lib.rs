//! # carfleet-api — HTTP Observability Pipeline for the CarFleet API
//!
//! Every request passes through a fixed middleware pipeline that annotates
//! it with a correlation id, logs the response it produced, emits an access
//! line, and funnels every failure through one error handler that logs and
//! classifies it. Records go to the [`carfleet_telemetry::LogRouter`] held
//! in [`AppState`].
//!
//! ## API Surface
//!
//! | Path              | Module                  |
//! |-------------------|-------------------------|
//! | `/`               | [`routes::info`]        |
//! | `/health/*`       | [`routes::health`]      |
//! | `/api/users`      | [`routes::users`]       |
//! | `/openapi.json`   | [`openapi`]             |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! RequestContext → AccessLog → ResponseLog → ErrorLog (timeout) → CatchPanic → Handler
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod lifecycle;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

pub use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    app_with(Router::new(), state)
}

/// Assemble the application around extra routes. The extra routes run
/// behind the same middleware stack as the built-in ones.
pub fn app_with(extra: Router<AppState>, state: AppState) -> Router {
    // Layers apply innermost first. The annotator enforces the body cap, so
    // the extractor limit is lifted.
    routes::router()
        .merge(openapi::router())
        .merge(extra)
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(CatchPanicLayer::custom(middleware::error_log::panic_response))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::error_log::error_log,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::response_log::response_log,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::access_log::access_log,
        ))
        .layer(from_fn(middleware::request_context::request_context))
        .with_state(state)
}
