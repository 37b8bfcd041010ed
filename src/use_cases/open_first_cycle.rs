//! Open first cycle use case.
//! Creates a newly onboarded tenant's first rent obligation.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::billing::next_due_date;
use crate::domain::{CycleInsert, NewObligation, ObligationLabel};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{LedgerStore, TenantDirectory};
use crate::services::events::{EventBus, LedgerEvent};

/// Use case for opening a tenant's first billing cycle.
pub struct OpenFirstCycle {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn TenantDirectory>,
    events: EventBus,
}

impl OpenFirstCycle {
    pub fn new(store: Arc<dyn LedgerStore>, directory: Arc<dyn TenantDirectory>, events: EventBus) -> Self {
        Self {
            store,
            directory,
            events,
        }
    }

    /// First rent cycle is due on the unit's billing day on or after move-in.
    /// Running it again for the same tenant returns the existing cycle.
    pub async fn execute(&self, tenant_id: Uuid) -> LedgerResult<CycleInsert> {
        let profile = self
            .directory
            .find_tenant(tenant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Tenant {}", tenant_id)))?;

        let due_date = next_due_date(profile.move_in_date, profile.billing_day)?;
        let cycle = self
            .store
            .ensure_rent_cycle(NewObligation {
                tenant_id,
                unit_id: profile.unit_id,
                label: ObligationLabel::Rent,
                total_amount: profile.monthly_rent,
                due_date,
                notes: Some("First billing cycle".to_string()),
            })
            .await?;

        if let CycleInsert::Created(obligation) = &cycle {
            tracing::info!(
                tenant_id = %tenant_id,
                obligation_id = %obligation.id,
                due_date = %obligation.due_date,
                "First rent cycle opened"
            );
            self.events
                .publish(LedgerEvent::ObligationCreated {
                    obligation: obligation.clone(),
                })
                .await;
        }

        Ok(cycle)
    }
}
