use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::billing::add_billing_period;
use crate::domain::{CycleInsert, NewObligation, Obligation, ObligationLabel};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::LedgerStore;
use crate::services::events::{LedgerEvent, LedgerEventHandler};

/// Opens the next rent cycle once the current one is paid off.
pub struct RecurrenceGenerator {
    store: Arc<dyn LedgerStore>,
}

impl RecurrenceGenerator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Returns the newly created obligation, or `None` when nothing was created
    /// because the obligation does not recur or the next cycle already exists.
    pub async fn ensure_next_cycle(&self, completed: &Obligation) -> LedgerResult<Option<Obligation>> {
        if !completed.label.is_recurring() {
            tracing::debug!(obligation_id = %completed.id, label = %completed.label, "Obligation does not recur");
            return Ok(None);
        }

        if !completed.is_fully_paid() {
            return Err(LedgerError::Validation(format!(
                "obligation {} is not fully paid; next cycle not due yet",
                completed.id
            )));
        }

        let next_due = add_billing_period(completed.due_date)?;
        let next = NewObligation {
            tenant_id: completed.tenant_id,
            unit_id: completed.unit_id,
            label: ObligationLabel::Rent,
            total_amount: completed.total_amount.clone(),
            due_date: next_due,
            notes: None,
        };

        match self.store.ensure_rent_cycle(next).await? {
            CycleInsert::Created(obligation) => {
                tracing::info!(
                    tenant_id = %obligation.tenant_id,
                    obligation_id = %obligation.id,
                    due_date = %obligation.due_date,
                    "Next rent cycle created"
                );
                Ok(Some(obligation))
            }
            CycleInsert::Existing(existing) => {
                tracing::debug!(
                    tenant_id = %existing.tenant_id,
                    obligation_id = %existing.id,
                    "Next rent cycle already exists"
                );
                Ok(None)
            }
        }
    }
}

/// Drives the generator from `ObligationCompleted` events.
pub struct RecurrenceHandler {
    generator: Arc<RecurrenceGenerator>,
}

impl RecurrenceHandler {
    pub fn new(generator: Arc<RecurrenceGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl LedgerEventHandler for RecurrenceHandler {
    fn name(&self) -> &'static str {
        "rent_recurrence"
    }

    async fn handle(&self, event: &LedgerEvent) -> anyhow::Result<Vec<LedgerEvent>> {
        if let LedgerEvent::ObligationCompleted { obligation } = event {
            if obligation.label.is_recurring() {
                if let Some(next) = self.generator.ensure_next_cycle(obligation).await? {
                    return Ok(vec![LedgerEvent::ObligationCreated { obligation: next }]);
                }
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryLedgerStore;
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn paid(label: ObligationLabel, due: NaiveDate) -> Obligation {
        Obligation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            label,
            total_amount: BigDecimal::from(5000),
            amount_paid: BigDecimal::from(5000),
            due_date: due,
            fully_paid_at: Some(Utc::now()),
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn creates_next_cycle_once() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let generator = RecurrenceGenerator::new(store.clone());
        let completed = paid(ObligationLabel::Rent, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
        store.seed_obligation(completed.clone()).await;

        let next = generator.ensure_next_cycle(&completed).await.unwrap().unwrap();
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(next.total_amount, completed.total_amount);
        assert_eq!(next.amount_paid, BigDecimal::from(0));
        assert_eq!(next.label, ObligationLabel::Rent);

        assert!(generator.ensure_next_cycle(&completed).await.unwrap().is_none());
        let owned = store.list_tenant_obligations(completed.tenant_id).await.unwrap();
        assert_eq!(owned.len(), 2);
    }

    #[tokio::test]
    async fn ignores_non_recurring_labels() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let generator = RecurrenceGenerator::new(store.clone());
        let completed = paid(
            ObligationLabel::WaterBill,
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        );

        assert!(generator.ensure_next_cycle(&completed).await.unwrap().is_none());
        assert!(store.list_obligations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refuses_unpaid_obligation() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let generator = RecurrenceGenerator::new(store);
        let mut open = paid(ObligationLabel::Rent, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        open.amount_paid = BigDecimal::from(10);

        assert!(matches!(
            generator.ensure_next_cycle(&open).await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn handler_announces_created_cycle() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let handler = RecurrenceHandler::new(Arc::new(RecurrenceGenerator::new(store.clone())));
        let completed = paid(ObligationLabel::Rent, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        store.seed_obligation(completed.clone()).await;
        let event = LedgerEvent::ObligationCompleted {
            obligation: completed,
        };

        let follow_ups = handler.handle(&event).await.unwrap();
        assert_eq!(follow_ups.len(), 1);
        match &follow_ups[0] {
            LedgerEvent::ObligationCreated { obligation } => {
                assert_eq!(obligation.due_date, NaiveDate::from_ymd_opt(2025, 2, 10).unwrap());
            }
            other => panic!("expected ObligationCreated, got {other:?}"),
        }

        assert!(handler.handle(&event).await.unwrap().is_empty());
    }
}
