use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{PaymentTransaction, VerificationState};
use crate::error::{AppError, LedgerError};
use crate::handlers::json_body;
use crate::middleware::auth::Verifier;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitPaymentRequest {
    pub tenant_id: Uuid,
    /// Bank or mobile-money reference quoted by the tenant.
    pub transaction_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub transaction_id: String,
    #[schema(value_type = String, example = "1500.00")]
    pub amount: BigDecimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPaymentRequest {
    pub transaction_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: Uuid,
    pub external_ref: String,
    pub obligation_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    /// `pending` or `verified`
    pub status: String,
    #[schema(value_type = Option<String>)]
    pub amount: Option<BigDecimal>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<PaymentTransaction> for TransactionView {
    fn from(tx: PaymentTransaction) -> Self {
        let (status, amount, verified_by, verified_at) = match tx.state {
            VerificationState::Pending => ("pending", None, None, None),
            VerificationState::Verified {
                amount,
                verified_by,
                verified_at,
            } => ("verified", Some(amount), Some(verified_by), Some(verified_at)),
        };

        Self {
            id: tx.id,
            external_ref: tx.external_ref,
            obligation_id: tx.obligation_id,
            submitted_at: tx.submitted_at,
            status: status.to_string(),
            amount,
            verified_by,
            verified_at,
            notes: tx.notes,
        }
    }
}

#[utoipa::path(
    post,
    path = "/payments/submit",
    request_body = SubmitPaymentRequest,
    responses(
        (status = 204, description = "Claim recorded, or already recorded for this tenant"),
        (status = 400, description = "Invalid reference or unknown tenant"),
        (status = 500, description = "Persistence failure")
    ),
    tag = "Payments"
)]
pub async fn submit_payment(
    State(state): State<AppState>,
    payload: Result<Json<SubmitPaymentRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let payload = json_body(payload)?;
    state
        .ledger
        .submissions
        .submit_intent(payload.tenant_id, &payload.transaction_id)
        .await
        .map_err(|e| match e {
            // An unknown tenant is a client error on this route.
            LedgerError::NotFound(_) | LedgerError::NoOutstandingObligations(_) => {
                AppError::BadRequest(e.to_string())
            }
            other => other.into(),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and allocated", body = ActionResponse),
        (status = 400, description = "Invalid amount or reference"),
        (status = 401, description = "Missing or unknown verifier key"),
        (status = 404, description = "Unknown transaction"),
        (status = 409, description = "Already verified or nothing outstanding")
    ),
    security(("verifier_key" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(Verifier(verifier)): Extension<Verifier>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let receipt = state
        .ledger
        .verifications
        .verify(&payload.transaction_id, payload.amount, &verifier)
        .await?;

    let mut message = format!(
        "Payment {} verified and applied to {} obligation(s)",
        receipt.transaction.external_ref,
        receipt.allocations.len()
    );
    if !receipt.completed.is_empty() {
        message.push_str(&format!(", {} now fully paid", receipt.completed.len()));
    }

    Ok(Json(ActionResponse {
        success: true,
        message,
    }))
}

#[utoipa::path(
    post,
    path = "/payments/reject",
    request_body = RejectPaymentRequest,
    responses(
        (status = 200, description = "Pending claim deleted", body = ActionResponse),
        (status = 401, description = "Missing or unknown verifier key"),
        (status = 404, description = "Unknown transaction"),
        (status = 409, description = "Transaction already verified")
    ),
    security(("verifier_key" = [])),
    tag = "Payments"
)]
pub async fn reject_payment(
    State(state): State<AppState>,
    Extension(Verifier(verifier)): Extension<Verifier>,
    payload: Result<Json<RejectPaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let rejected = state
        .ledger
        .verifications
        .reject(&payload.transaction_id)
        .await?;

    tracing::info!(
        external_ref = %rejected.external_ref,
        verifier = %verifier,
        "Rejection requested by verifier"
    );

    Ok(Json(ActionResponse {
        success: true,
        message: format!("Payment {} rejected", rejected.external_ref),
    }))
}

#[utoipa::path(
    get,
    path = "/payments/pending",
    responses(
        (status = 200, description = "Unverified claims, oldest first", body = [TransactionView]),
        (status = 401, description = "Missing or unknown verifier key")
    ),
    security(("verifier_key" = [])),
    tag = "Payments"
)]
pub async fn pending_payments(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let pending = state.ledger.obligations.pending_transactions().await?;
    let views: Vec<TransactionView> = pending.into_iter().map(TransactionView::from).collect();
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/payments/{external_ref}",
    params(("external_ref" = String, Path, description = "Tenant-quoted transaction reference")),
    responses(
        (status = 200, description = "Payment claim", body = TransactionView),
        (status = 404, description = "Unknown transaction")
    ),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(external_ref): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.ledger.obligations.transaction(&external_ref).await?;
    Ok(Json(TransactionView::from(tx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_view_exposes_verification_fields() {
        let mut tx = PaymentTransaction::new("TXN9".to_string(), Uuid::new_v4(), Utc::now());
        let pending = TransactionView::from(tx.clone());
        assert_eq!(pending.status, "pending");
        assert!(pending.amount.is_none());

        tx.state = VerificationState::Verified {
            amount: BigDecimal::from(250),
            verified_by: "alice".to_string(),
            verified_at: Utc::now(),
        };
        let verified = TransactionView::from(tx);
        assert_eq!(verified.status, "verified");
        assert_eq!(verified.amount, Some(BigDecimal::from(250)));
        assert_eq!(verified.verified_by.as_deref(), Some("alice"));
    }
}
