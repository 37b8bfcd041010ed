use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Obligation, ObligationStatus};
use crate::error::LedgerResult;
use crate::ports::{Clock, LedgerStore};
use crate::services::summary_cache::SummaryCache;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub total_count: usize,
    pub paid_count: usize,
    pub pending_count: usize,
    pub overdue_count: usize,
    /// Sum of remaining balances of pending obligations.
    #[schema(value_type = String)]
    pub pending_amount: BigDecimal,
    /// Sum of remaining balances of overdue obligations.
    #[schema(value_type = String)]
    pub overdue_amount: BigDecimal,
    #[schema(value_type = String)]
    pub collected_amount: BigDecimal,
    pub as_of: Option<NaiveDate>,
}

impl Default for DashboardSummary {
    fn default() -> Self {
        Self {
            total_count: 0,
            paid_count: 0,
            pending_count: 0,
            overdue_count: 0,
            pending_amount: BigDecimal::from(0),
            overdue_amount: BigDecimal::from(0),
            collected_amount: BigDecimal::from(0),
            as_of: None,
        }
    }
}

/// Buckets obligations into paid, pending and overdue as of `today`.
pub fn summarize(obligations: &[Obligation], today: NaiveDate) -> DashboardSummary {
    let mut summary = DashboardSummary {
        as_of: Some(today),
        ..DashboardSummary::default()
    };

    for obligation in obligations {
        summary.total_count += 1;
        summary.collected_amount = &summary.collected_amount + &obligation.amount_paid;
        match obligation.status_on(today) {
            ObligationStatus::Paid => summary.paid_count += 1,
            ObligationStatus::Pending => {
                summary.pending_count += 1;
                summary.pending_amount = &summary.pending_amount + &obligation.remaining_balance();
            }
            ObligationStatus::Overdue => {
                summary.overdue_count += 1;
                summary.overdue_amount = &summary.overdue_amount + &obligation.remaining_balance();
            }
        }
    }

    summary
}

/// Read-only aggregates over the obligation store.
pub struct DashboardService {
    store: Arc<dyn LedgerStore>,
    cache: SummaryCache,
    clock: Arc<dyn Clock>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn LedgerStore>, cache: SummaryCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    pub async fn summary(&self) -> LedgerResult<DashboardSummary> {
        let today = self.clock.today();
        if let Some(cached) = self.cache.get().await {
            if cached.as_of == Some(today) {
                return Ok(cached);
            }
        }

        let generation = self.cache.generation().await;
        let obligations = self.store.list_obligations().await?;
        let summary = summarize(&obligations, today);
        if !self.cache.put_if_current(generation, summary.clone()).await {
            tracing::debug!("Dashboard summary invalidated during read, not cached");
        }
        Ok(summary)
    }

    pub async fn tenant_summary(&self, tenant_id: Uuid) -> LedgerResult<DashboardSummary> {
        let obligations = self.store.list_tenant_obligations(tenant_id).await?;
        Ok(summarize(&obligations, self.clock.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObligationLabel;
    use chrono::Utc;

    fn obligation(total: i64, paid: i64, due: NaiveDate) -> Obligation {
        Obligation {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            label: ObligationLabel::Rent,
            total_amount: BigDecimal::from(total),
            amount_paid: BigDecimal::from(paid),
            due_date: due,
            fully_paid_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn buckets_and_sums_remaining_balances() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let obligations = vec![
            obligation(5000, 5000, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()),
            obligation(5000, 1000, NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()),
            obligation(5000, 0, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()),
            obligation(300, 100, NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()),
        ];

        let summary = summarize(&obligations, today);
        assert_eq!(summary.total_count, 4);
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.pending_count, 2);
        assert_eq!(summary.overdue_amount, BigDecimal::from(4000));
        assert_eq!(summary.pending_amount, BigDecimal::from(5200));
        assert_eq!(summary.collected_amount, BigDecimal::from(6100));
        assert_eq!(summary.as_of, Some(today));
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = summarize(&[], NaiveDate::from_ymd_opt(2025, 2, 15).unwrap());
        assert_eq!(summary.total_count, 0);
        assert_eq!(summary.pending_amount, BigDecimal::from(0));
    }
}
