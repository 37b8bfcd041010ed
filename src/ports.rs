//! Seams between the ledger services and their collaborators.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Allocation, CycleInsert, NewObligation, Obligation, PaymentTransaction, SubmissionOutcome,
};
use crate::error::LedgerResult;

/// What the ledger needs to know about a tenant, read from the tenant and unit directories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantProfile {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub move_in_date: NaiveDate,
    pub monthly_rent: BigDecimal,
    pub billing_day: u32,
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, tenant_id: Uuid) -> LedgerResult<Option<TenantProfile>>;
}

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub external_ref: String,
    pub amount: BigDecimal,
    pub verified_by: String,
    pub verified_at: DateTime<Utc>,
}

/// Everything that changed in one committed verification.
#[derive(Debug, Clone)]
pub struct VerificationReceipt {
    pub transaction: PaymentTransaction,
    pub tenant_id: Uuid,
    pub allocations: Vec<Allocation>,
    pub overpayment: BigDecimal,
    /// Obligations that transitioned to fully paid in this commit.
    pub completed: Vec<Obligation>,
}

/// Obligation store and transaction store.
///
/// Obligation money fields are only ever written by `commit_verification`,
/// which must apply every allocation and the transaction's state change as
/// one atomic unit.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn ping(&self) -> LedgerResult<()>;

    async fn get_obligation(&self, id: Uuid) -> LedgerResult<Option<Obligation>>;

    /// Earliest not-fully-paid obligation by due date, then creation time.
    async fn earliest_unpaid_obligation(&self, tenant_id: Uuid) -> LedgerResult<Option<Obligation>>;

    async fn list_obligations(&self) -> LedgerResult<Vec<Obligation>>;

    async fn list_tenant_obligations(&self, tenant_id: Uuid) -> LedgerResult<Vec<Obligation>>;

    /// Inserts a one-off obligation.
    async fn insert_obligation(&self, new: NewObligation) -> LedgerResult<Obligation>;

    /// Inserts a rent cycle unless the tenant already has one in the same billing period.
    async fn ensure_rent_cycle(&self, new: NewObligation) -> LedgerResult<CycleInsert>;

    /// Records a pending claim, or reports the existing claim with the same reference.
    async fn record_submission(
        &self,
        tenant_id: Uuid,
        obligation_id: Uuid,
        external_ref: &str,
        submitted_at: DateTime<Utc>,
    ) -> LedgerResult<SubmissionOutcome>;

    async fn find_transaction(&self, external_ref: &str) -> LedgerResult<Option<PaymentTransaction>>;

    async fn list_pending_transactions(&self) -> LedgerResult<Vec<PaymentTransaction>>;

    async fn commit_verification(&self, request: &VerificationRequest) -> LedgerResult<VerificationReceipt>;

    /// Deletes a pending claim and returns it, together with its tenant.
    async fn delete_pending_transaction(
        &self,
        external_ref: &str,
    ) -> LedgerResult<(PaymentTransaction, Uuid)>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|p| *p.into_inner())
    }
}
