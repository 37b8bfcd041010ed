use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewObligation, Obligation, ObligationLabel, PaymentTransaction};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{LedgerStore, TenantDirectory};
use crate::services::events::{EventBus, LedgerEvent};
use crate::validation::{normalize_external_ref, normalize_notes, parse_due_date, validate_positive_amount};

#[derive(Debug, Clone)]
pub struct CustomObligationInput {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub label: String,
    pub amount: BigDecimal,
    pub due_date: String,
    pub notes: Option<String>,
}

pub struct ObligationService {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn TenantDirectory>,
    events: EventBus,
}

impl ObligationService {
    pub fn new(store: Arc<dyn LedgerStore>, directory: Arc<dyn TenantDirectory>, events: EventBus) -> Self {
        Self {
            store,
            directory,
            events,
        }
    }

    /// One-off charge such as a water bill or a maintenance fee.
    pub async fn create_custom_obligation(&self, input: CustomObligationInput) -> LedgerResult<Obligation> {
        let label: ObligationLabel = input.label.parse()?;
        if label.is_recurring() {
            return Err(LedgerError::Validation(
                "label: rent cycles are opened by onboarding and recurrence, not as custom charges"
                    .to_string(),
            ));
        }
        validate_positive_amount(&input.amount)?;
        let due_date = parse_due_date(&input.due_date)?;
        let notes = normalize_notes(input.notes.as_deref())?;

        let profile = self
            .directory
            .find_tenant(input.tenant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Tenant {}", input.tenant_id)))?;
        if profile.unit_id != input.unit_id {
            return Err(LedgerError::Validation(format!(
                "unit_id: tenant {} does not occupy unit {}",
                input.tenant_id, input.unit_id
            )));
        }

        let obligation = self
            .store
            .insert_obligation(NewObligation {
                tenant_id: input.tenant_id,
                unit_id: input.unit_id,
                label,
                total_amount: input.amount,
                due_date,
                notes,
            })
            .await?;

        tracing::info!(
            tenant_id = %obligation.tenant_id,
            obligation_id = %obligation.id,
            label = %obligation.label,
            amount = %obligation.total_amount,
            "Custom obligation created"
        );
        self.events
            .publish(LedgerEvent::ObligationCreated {
                obligation: obligation.clone(),
            })
            .await;

        Ok(obligation)
    }

    pub async fn tenant_obligations(&self, tenant_id: Uuid) -> LedgerResult<Vec<Obligation>> {
        self.store.list_tenant_obligations(tenant_id).await
    }

    pub async fn obligation(&self, id: Uuid) -> LedgerResult<Obligation> {
        self.store
            .get_obligation(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Obligation {}", id)))
    }

    pub async fn pending_transactions(&self) -> LedgerResult<Vec<PaymentTransaction>> {
        self.store.list_pending_transactions().await
    }

    pub async fn transaction(&self, external_ref: &str) -> LedgerResult<PaymentTransaction> {
        let external_ref = normalize_external_ref(external_ref)?;
        self.store
            .find_transaction(&external_ref)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", external_ref)))
    }
}
