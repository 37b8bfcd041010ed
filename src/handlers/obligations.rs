use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Obligation, ObligationLabel};
use crate::error::AppError;
use crate::handlers::json_body;
use crate::services::{CustomObligationInput, DashboardSummary};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateObligationRequest {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    /// One of `water_bill`, `power_bill`, `maintenance`, `other`.
    pub label: String,
    #[schema(value_type = String, example = "45.50")]
    pub amount: BigDecimal,
    /// `YYYY-MM-DD`
    pub due_date: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObligationView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub label: ObligationLabel,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[schema(value_type = String)]
    pub amount_paid: BigDecimal,
    #[schema(value_type = String)]
    pub remaining_balance: BigDecimal,
    pub is_fully_paid: bool,
    pub due_date: NaiveDate,
    pub fully_paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Obligation> for ObligationView {
    fn from(o: Obligation) -> Self {
        Self {
            remaining_balance: o.remaining_balance(),
            is_fully_paid: o.is_fully_paid(),
            id: o.id,
            tenant_id: o.tenant_id,
            unit_id: o.unit_id,
            label: o.label,
            total_amount: o.total_amount,
            amount_paid: o.amount_paid,
            due_date: o.due_date,
            fully_paid_at: o.fully_paid_at,
            notes: o.notes,
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateObligationResponse {
    pub success: bool,
    pub payment: ObligationView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FirstCycleResponse {
    pub success: bool,
    /// False when the tenant already had a rent cycle for that billing period.
    pub created: bool,
    pub obligation: ObligationView,
}

#[utoipa::path(
    post,
    path = "/obligations",
    request_body = CreateObligationRequest,
    responses(
        (status = 201, description = "Custom obligation created", body = CreateObligationResponse),
        (status = 400, description = "Invalid label, amount, due date or unit"),
        (status = 401, description = "Missing or unknown verifier key"),
        (status = 404, description = "Unknown tenant")
    ),
    security(("verifier_key" = [])),
    tag = "Obligations"
)]
pub async fn create_obligation(
    State(state): State<AppState>,
    payload: Result<Json<CreateObligationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let obligation = state
        .ledger
        .obligations
        .create_custom_obligation(CustomObligationInput {
            tenant_id: payload.tenant_id,
            unit_id: payload.unit_id,
            label: payload.label,
            amount: payload.amount,
            due_date: payload.due_date,
            notes: payload.notes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateObligationResponse {
            success: true,
            payment: obligation.into(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/tenants/{tenant_id}/first-cycle",
    params(("tenant_id" = Uuid, Path, description = "Tenant ID")),
    responses(
        (status = 201, description = "First rent cycle opened", body = FirstCycleResponse),
        (status = 200, description = "First rent cycle already existed", body = FirstCycleResponse),
        (status = 401, description = "Missing or unknown verifier key"),
        (status = 404, description = "Unknown tenant")
    ),
    security(("verifier_key" = [])),
    tag = "Obligations"
)]
pub async fn open_first_cycle(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let cycle = state.ledger.onboarding.execute(tenant_id).await?;
    let created = cycle.was_created();
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(FirstCycleResponse {
            success: true,
            created,
            obligation: cycle.into_obligation().into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/obligations",
    params(("tenant_id" = Uuid, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Tenant obligations by due date", body = [ObligationView])
    ),
    tag = "Obligations"
)]
pub async fn tenant_obligations(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let obligations = state.ledger.obligations.tenant_obligations(tenant_id).await?;
    let views: Vec<ObligationView> = obligations.into_iter().map(ObligationView::from).collect();
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/summary",
    params(("tenant_id" = Uuid, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Paid, pending and overdue totals for one tenant", body = DashboardSummary)
    ),
    tag = "Obligations"
)]
pub async fn tenant_summary(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<DashboardSummary>, AppError> {
    let summary = state.ledger.dashboard.tenant_summary(tenant_id).await?;
    Ok(Json(summary))
}
