use axum::{extract::State, Json};

use crate::error::AppError;
use crate::services::DashboardSummary;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/dashboard/summary",
    responses(
        (status = 200, description = "Portfolio-wide obligation totals", body = DashboardSummary),
        (status = 401, description = "Missing or unknown verifier key")
    ),
    security(("verifier_key" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard_summary(
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, AppError> {
    let summary = state.ledger.dashboard.summary().await?;
    Ok(Json(summary))
}
