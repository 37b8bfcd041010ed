use bigdecimal::BigDecimal;
use std::sync::Arc;

use crate::domain::PaymentTransaction;
use crate::error::LedgerResult;
use crate::ports::{Clock, LedgerStore, VerificationReceipt, VerificationRequest};
use crate::services::events::{EventBus, LedgerEvent};
use crate::validation::{normalize_external_ref, normalize_verifier, validate_positive_amount};

/// Verifies or rejects submitted payment claims.
///
/// Verification allocates the amount across the tenant's unpaid obligations
/// inside one store commit. Recurrence and cache invalidation run afterwards
/// as event handlers and cannot affect the committed result.
pub struct VerificationService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl VerificationService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    pub async fn verify(
        &self,
        external_ref: &str,
        amount: BigDecimal,
        verifier: &str,
    ) -> LedgerResult<VerificationReceipt> {
        let external_ref = normalize_external_ref(external_ref)?;
        let verified_by = normalize_verifier(verifier)?;
        validate_positive_amount(&amount)?;

        let request = VerificationRequest {
            external_ref,
            amount,
            verified_by,
            verified_at: self.clock.now(),
        };

        let receipt = match self.store.commit_verification(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    external_ref = %request.external_ref,
                    verifier = %request.verified_by,
                    error = %e,
                    "Payment verification refused"
                );
                return Err(e);
            }
        };

        tracing::info!(
            external_ref = %request.external_ref,
            tenant_id = %receipt.tenant_id,
            amount = %request.amount,
            verifier = %request.verified_by,
            obligations_touched = receipt.allocations.len(),
            obligations_completed = receipt.completed.len(),
            "Payment verified"
        );
        if receipt.overpayment > BigDecimal::from(0) {
            // No credit balance exists; the surplus sits on the newest obligation.
            tracing::warn!(
                external_ref = %request.external_ref,
                tenant_id = %receipt.tenant_id,
                overpayment = %receipt.overpayment,
                "Overpayment deposited onto last outstanding obligation"
            );
        }

        let mut events = vec![LedgerEvent::PaymentVerified {
            tenant_id: receipt.tenant_id,
            external_ref: request.external_ref.clone(),
            amount: request.amount.clone(),
            verified_by: request.verified_by.clone(),
            allocations: receipt.allocations.clone(),
        }];
        events.extend(
            receipt
                .completed
                .iter()
                .cloned()
                .map(|obligation| LedgerEvent::ObligationCompleted { obligation }),
        );
        self.events.publish_all(events).await;

        Ok(receipt)
    }

    /// Permanently deletes a pending claim.
    pub async fn reject(&self, external_ref: &str) -> LedgerResult<PaymentTransaction> {
        let external_ref = normalize_external_ref(external_ref)?;
        let (rejected, tenant_id) = self.store.delete_pending_transaction(&external_ref).await?;

        tracing::info!(
            external_ref = %rejected.external_ref,
            tenant_id = %tenant_id,
            "Payment submission rejected"
        );
        self.events
            .publish(LedgerEvent::TransactionRejected {
                tenant_id,
                external_ref: rejected.external_ref.clone(),
            })
            .await;

        Ok(rejected)
    }
}
