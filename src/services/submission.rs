use std::sync::Arc;
use uuid::Uuid;

use crate::domain::billing::next_due_date;
use crate::domain::{NewObligation, Obligation, ObligationLabel, SubmissionOutcome};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{Clock, LedgerStore, TenantDirectory};
use crate::services::events::{EventBus, LedgerEvent};
use crate::validation::normalize_external_ref;

/// Upper bound on how many already-paid periods synthesis will skip over.
const MAX_SYNTHESIS_PERIODS: usize = 24;

/// Records tenant payment claims against their current open obligation.
pub struct SubmissionService {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn TenantDirectory>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SubmissionService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn TenantDirectory>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            events,
        }
    }

    /// Submitting the same reference again is a successful no-op.
    pub async fn submit_intent(&self, tenant_id: Uuid, external_ref: &str) -> LedgerResult<SubmissionOutcome> {
        let external_ref = normalize_external_ref(external_ref)?;
        let obligation = self.current_open_obligation(tenant_id).await?;

        let outcome = self
            .store
            .record_submission(tenant_id, obligation.id, &external_ref, self.clock.now())
            .await?;

        match &outcome {
            SubmissionOutcome::Created(tx) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    external_ref = %tx.external_ref,
                    obligation_id = %tx.obligation_id,
                    "Payment submission recorded"
                );
                self.events
                    .publish(LedgerEvent::TransactionSubmitted {
                        tenant_id,
                        external_ref: tx.external_ref.clone(),
                        obligation_id: tx.obligation_id,
                    })
                    .await;
            }
            SubmissionOutcome::Duplicate(tx) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    external_ref = %tx.external_ref,
                    "Duplicate payment submission ignored"
                );
            }
        }

        Ok(outcome)
    }

    /// Earliest unpaid obligation, or a synthesized rent cycle when the tenant has none.
    pub async fn current_open_obligation(&self, tenant_id: Uuid) -> LedgerResult<Obligation> {
        if let Some(open) = self.store.earliest_unpaid_obligation(tenant_id).await? {
            return Ok(open);
        }

        let profile = self
            .directory
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Tenant {}", tenant_id)))?;

        let mut due_date = next_due_date(self.clock.today(), profile.billing_day)?;
        for _ in 0..MAX_SYNTHESIS_PERIODS {
            let cycle = self
                .store
                .ensure_rent_cycle(NewObligation {
                    tenant_id,
                    unit_id: profile.unit_id,
                    label: ObligationLabel::Rent,
                    total_amount: profile.monthly_rent.clone(),
                    due_date,
                    notes: None,
                })
                .await?;

            let created = cycle.was_created();
            let obligation = cycle.into_obligation();
            if created {
                tracing::info!(
                    tenant_id = %tenant_id,
                    obligation_id = %obligation.id,
                    due_date = %obligation.due_date,
                    "Synthesized rent obligation for submission"
                );
                self.events
                    .publish(LedgerEvent::ObligationCreated {
                        obligation: obligation.clone(),
                    })
                    .await;
            }
            if !obligation.is_fully_paid() {
                return Ok(obligation);
            }
            let day_after = due_date.succ_opt().ok_or_else(|| {
                LedgerError::Validation(format!("due_date {} is out of range", due_date))
            })?;
            due_date = next_due_date(day_after, profile.billing_day)?;
        }

        Err(LedgerError::NoOutstandingObligations(tenant_id.to_string()))
    }
}
