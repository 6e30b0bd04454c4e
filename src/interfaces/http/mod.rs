//! HTTP surface of forecastd.

pub mod error;
pub mod extract;
pub mod handlers;

use crate::application::bootstrap::ServicesHandle;
use crate::config::ServerEnvConfig;
use axum::Router;
use axum::extract::{DefaultBodyLimit, MatchedPath, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::ApiError;

pub fn router(state: ServicesHandle, server: &ServerEnvConfig) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict))
        .route("/forecast", post(handlers::forecast))
        .route("/shap-summary", post(handlers::shap_summary))
        .route("/explain", post(handlers::explain))
        .route("/models", get(handlers::models))
        .route("/health", get(handlers::health))
        .route("/feedback", post(handlers::feedback))
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), record_request))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(cors_layer(&server.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn record_request(
    State(state): State<ServicesHandle>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;
    state
        .metrics
        .inc_requests(&endpoint, response.status().as_u16());
    response
}

/// `*` allows any origin without credentials; otherwise the listed origins
/// are allowed with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
