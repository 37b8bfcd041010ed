pub mod dashboard;
pub mod obligations;
pub mod payments;

use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

use crate::error::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub db: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthStatus),
        (status = 503, description = "Service is unhealthy", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match state.ledger.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the ledger store");
            "disconnected"
        }
    };
    let healthy = db_status == "connected";

    let health_response = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        db: db_status.to_string(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}

/// Unwraps a JSON body, turning extractor rejections into the ledger's 400 shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

struct VerifierKeyScheme;

impl Modify for VerifierKeyScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "verifier_key",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        payments::submit_payment,
        payments::verify_payment,
        payments::reject_payment,
        payments::pending_payments,
        payments::get_payment,
        obligations::create_obligation,
        obligations::open_first_cycle,
        obligations::tenant_obligations,
        obligations::tenant_summary,
        dashboard::dashboard_summary,
    ),
    components(schemas(
        HealthStatus,
        payments::SubmitPaymentRequest,
        payments::VerifyPaymentRequest,
        payments::RejectPaymentRequest,
        payments::ActionResponse,
        payments::TransactionView,
        obligations::CreateObligationRequest,
        obligations::CreateObligationResponse,
        obligations::FirstCycleResponse,
        obligations::ObligationView,
        crate::domain::ObligationLabel,
        crate::services::DashboardSummary,
    )),
    modifiers(&VerifierKeyScheme),
    tags(
        (name = "Payments", description = "Tenant payment claims and verification"),
        (name = "Obligations", description = "Rent cycles and custom charges"),
        (name = "Dashboard", description = "Aggregated obligation status"),
        (name = "Health", description = "Liveness")
    )
)]
pub struct ApiDoc;
