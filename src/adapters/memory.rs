//! In-memory implementations of the ledger ports.
//!
//! Every operation runs under one async mutex, so each call is atomic with
//! respect to every other call, mirroring the row locks the Postgres adapter
//! takes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::domain::allocation::{apply_plan, plan_waterfall};
use crate::domain::{
    CycleInsert, NewObligation, Obligation, ObligationLabel, PaymentTransaction,
    SubmissionOutcome,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{
    LedgerStore, TenantDirectory, TenantProfile, VerificationReceipt, VerificationRequest,
};

#[derive(Debug, Default)]
struct LedgerState {
    obligations: Vec<Obligation>,
    transactions: HashMap<String, PaymentTransaction>,
}

impl LedgerState {
    fn obligation(&self, id: Uuid) -> Option<&Obligation> {
        self.obligations.iter().find(|o| o.id == id)
    }

    fn unpaid_for_tenant(&self, tenant_id: Uuid) -> Vec<Obligation> {
        let mut unpaid: Vec<Obligation> = self
            .obligations
            .iter()
            .filter(|o| o.tenant_id == tenant_id && !o.is_fully_paid())
            .cloned()
            .collect();
        sort_by_due_date(&mut unpaid);
        unpaid
    }
}

fn sort_by_due_date(obligations: &mut [Obligation]) {
    obligations.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an obligation as-is, including payment progress. Intended for seeding.
    pub async fn seed_obligation(&self, obligation: Obligation) {
        self.state.lock().await.obligations.push(obligation);
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }

    async fn get_obligation(&self, id: Uuid) -> LedgerResult<Option<Obligation>> {
        Ok(self.state.lock().await.obligation(id).cloned())
    }

    async fn earliest_unpaid_obligation(&self, tenant_id: Uuid) -> LedgerResult<Option<Obligation>> {
        Ok(self
            .state
            .lock()
            .await
            .unpaid_for_tenant(tenant_id)
            .into_iter()
            .next())
    }

    async fn list_obligations(&self) -> LedgerResult<Vec<Obligation>> {
        let mut all = self.state.lock().await.obligations.clone();
        sort_by_due_date(&mut all);
        Ok(all)
    }

    async fn list_tenant_obligations(&self, tenant_id: Uuid) -> LedgerResult<Vec<Obligation>> {
        let mut owned: Vec<Obligation> = self
            .state
            .lock()
            .await
            .obligations
            .iter()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect();
        sort_by_due_date(&mut owned);
        Ok(owned)
    }

    async fn insert_obligation(&self, new: NewObligation) -> LedgerResult<Obligation> {
        let obligation = new.into_obligation(Utc::now());
        self.state.lock().await.obligations.push(obligation.clone());
        Ok(obligation)
    }

    async fn ensure_rent_cycle(&self, new: NewObligation) -> LedgerResult<CycleInsert> {
        let mut state = self.state.lock().await;
        let candidate = new.into_obligation(Utc::now());
        let existing = state.obligations.iter().find(|o| {
            o.tenant_id == candidate.tenant_id
                && o.label == ObligationLabel::Rent
                && o.billing_period() == candidate.billing_period()
        });

        if let Some(existing) = existing {
            return Ok(CycleInsert::Existing(existing.clone()));
        }

        state.obligations.push(candidate.clone());
        Ok(CycleInsert::Created(candidate))
    }

    async fn record_submission(
        &self,
        tenant_id: Uuid,
        obligation_id: Uuid,
        external_ref: &str,
        submitted_at: DateTime<Utc>,
    ) -> LedgerResult<SubmissionOutcome> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.transactions.get(external_ref) {
            let owner = state
                .obligation(existing.obligation_id)
                .map(|o| o.tenant_id);
            if owner != Some(tenant_id) {
                return Err(LedgerError::Validation(format!(
                    "transaction_id: {} is already used by another tenant",
                    external_ref
                )));
            }
            return Ok(SubmissionOutcome::Duplicate(existing.clone()));
        }

        if state.obligation(obligation_id).is_none() {
            return Err(LedgerError::NotFound(format!("Obligation {}", obligation_id)));
        }

        let tx = PaymentTransaction::new(external_ref.to_string(), obligation_id, submitted_at);
        state
            .transactions
            .insert(external_ref.to_string(), tx.clone());
        Ok(SubmissionOutcome::Created(tx))
    }

    async fn find_transaction(&self, external_ref: &str) -> LedgerResult<Option<PaymentTransaction>> {
        Ok(self.state.lock().await.transactions.get(external_ref).cloned())
    }

    async fn list_pending_transactions(&self) -> LedgerResult<Vec<PaymentTransaction>> {
        let mut pending: Vec<PaymentTransaction> = self
            .state
            .lock()
            .await
            .transactions
            .values()
            .filter(|tx| !tx.is_verified())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(pending)
    }

    async fn commit_verification(&self, request: &VerificationRequest) -> LedgerResult<VerificationReceipt> {
        let mut state = self.state.lock().await;

        let mut transaction = state
            .transactions
            .get(&request.external_ref)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", request.external_ref)))?;
        if let Some(err) = transaction.already_verified() {
            return Err(err);
        }

        let tenant_id = state
            .obligation(transaction.obligation_id)
            .map(|o| o.tenant_id)
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Obligation {}", transaction.obligation_id))
            })?;

        let mut unpaid = state.unpaid_for_tenant(tenant_id);
        if unpaid.is_empty() {
            return Err(LedgerError::NoOutstandingObligations(tenant_id.to_string()));
        }

        // Work on copies so a failure leaves the state untouched.
        let plan = plan_waterfall(&unpaid, transaction.obligation_id, &request.amount)?;
        let completed = apply_plan(&mut unpaid, &plan, request.verified_at)?;
        transaction.mark_verified(
            request.amount.clone(),
            request.verified_by.clone(),
            request.verified_at,
        )?;

        for updated in unpaid {
            if let Some(slot) = state.obligations.iter_mut().find(|o| o.id == updated.id) {
                *slot = updated;
            }
        }
        state
            .transactions
            .insert(request.external_ref.clone(), transaction.clone());

        Ok(VerificationReceipt {
            transaction,
            tenant_id,
            allocations: plan.allocations,
            overpayment: plan.overpayment,
            completed,
        })
    }

    async fn delete_pending_transaction(
        &self,
        external_ref: &str,
    ) -> LedgerResult<(PaymentTransaction, Uuid)> {
        let mut state = self.state.lock().await;
        let transaction = state
            .transactions
            .get(external_ref)
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", external_ref)))?;
        transaction.ensure_rejectable()?;

        let tenant_id = state
            .obligation(transaction.obligation_id)
            .map(|o| o.tenant_id)
            .unwrap_or_else(Uuid::nil);
        let removed = state
            .transactions
            .remove(external_ref)
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", external_ref)))?;
        Ok((removed, tenant_id))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTenantDirectory {
    tenants: Arc<RwLock<HashMap<Uuid, TenantProfile>>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: TenantProfile) {
        self.tenants.write().await.insert(profile.tenant_id, profile);
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_tenant(&self, tenant_id: Uuid) -> LedgerResult<Option<TenantProfile>> {
        Ok(self.tenants.read().await.get(&tenant_id).cloned())
    }
}
