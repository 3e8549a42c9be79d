//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the whole API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CarFleet API",
        version = "1.0.0",
        description = "Fleet management API with structured request, response, access and error logging.\n\nEvery response carries the `x-request-id` correlation header. Error responses share one payload shape: `{status, statusCode, message, stack?, errors?}`.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server"),
    ),
    paths(
        crate::routes::info::info,
        crate::routes::health::health,
        crate::routes::health::ready,
        crate::routes::health::live,
        crate::routes::users::create_user,
    ),
    components(
        schemas(
            crate::error::ErrorPayload,
            crate::routes::info::ServiceInfo,
            crate::routes::health::HealthResponse,
            crate::routes::health::UnhealthyResponse,
            crate::routes::health::ProbeStatus,
            crate::routes::users::CreateUserRequest,
            crate::routes::users::CreateUserResponse,
        )
    ),
    tags(
        (name = "info", description = "Service identification"),
        (name = "health", description = "Health, readiness and liveness probes"),
        (name = "users", description = "User management"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "CarFleet API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_spec_has_all_paths() {
        let spec = ApiDoc::openapi();
        for path in ["/", "/health", "/health/ready", "/health/live", "/api/users"] {
            assert!(
                spec.paths.paths.contains_key(path),
                "OpenAPI spec should contain {path}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        for name in ["ErrorPayload", "HealthResponse", "UnhealthyResponse", "CreateUserResponse"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
    }

    #[test]
    fn test_openapi_spec_serializes_to_json() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_value(&spec).unwrap();
        assert!(json["openapi"].as_str().unwrap().starts_with("3."));
        assert_eq!(json["info"]["title"], "CarFleet API");
    }
}
