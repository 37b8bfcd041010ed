pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod use_cases;
pub mod validation;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::ApiDoc;
use crate::services::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    /// API key -> verifier identity.
    pub verifier_keys: Arc<HashMap<String, String>>,
}

impl AppState {
    pub fn new(ledger: Ledger, verifier_keys: HashMap<String, String>) -> Self {
        Self {
            ledger,
            verifier_keys: Arc::new(verifier_keys),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let verifier_routes = Router::new()
        .route("/payments/verify", post(handlers::payments::verify_payment))
        .route("/payments/reject", post(handlers::payments::reject_payment))
        .route("/payments/pending", get(handlers::payments::pending_payments))
        .route("/obligations", post(handlers::obligations::create_obligation))
        .route(
            "/tenants/:tenant_id/first-cycle",
            post(handlers::obligations::open_first_cycle),
        )
        .route("/dashboard/summary", get(handlers::dashboard::dashboard_summary))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::verifier_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/submit", post(handlers::payments::submit_payment))
        .route("/payments/:external_ref", get(handlers::payments::get_payment))
        .route(
            "/tenants/:tenant_id/obligations",
            get(handlers::obligations::tenant_obligations),
        )
        .route(
            "/tenants/:tenant_id/summary",
            get(handlers::obligations::tenant_summary),
        )
        .merge(verifier_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}

/// CORS for the configured origins, or any origin when none are configured.
pub fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(origins)
        }
        None => layer.allow_origin(Any),
    }
}
