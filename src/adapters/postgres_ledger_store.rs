//! Postgres implementation of LedgerStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::{ObligationRow, PaymentTransactionRow};
use crate::db::queries;
use crate::domain::allocation::{apply_plan, plan_waterfall};
use crate::domain::{
    CycleInsert, NewObligation, Obligation, PaymentTransaction, SubmissionOutcome,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::{LedgerStore, VerificationReceipt, VerificationRequest};

/// Postgres-backed obligation and transaction store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn obligations(rows: Vec<ObligationRow>) -> LedgerResult<Vec<Obligation>> {
    rows.into_iter().map(ObligationRow::into_domain).collect()
}

fn transactions(rows: Vec<PaymentTransactionRow>) -> LedgerResult<Vec<PaymentTransaction>> {
    rows.into_iter().map(PaymentTransactionRow::into_domain).collect()
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn ping(&self) -> LedgerResult<()> {
        queries::ping(&self.pool).await?;
        Ok(())
    }

    async fn get_obligation(&self, id: Uuid) -> LedgerResult<Option<Obligation>> {
        queries::get_obligation(&self.pool, id)
            .await?
            .map(ObligationRow::into_domain)
            .transpose()
    }

    async fn earliest_unpaid_obligation(&self, tenant_id: Uuid) -> LedgerResult<Option<Obligation>> {
        queries::earliest_unpaid_obligation(&self.pool, tenant_id)
            .await?
            .map(ObligationRow::into_domain)
            .transpose()
    }

    async fn list_obligations(&self) -> LedgerResult<Vec<Obligation>> {
        obligations(queries::list_obligations(&self.pool).await?)
    }

    async fn list_tenant_obligations(&self, tenant_id: Uuid) -> LedgerResult<Vec<Obligation>> {
        obligations(queries::list_tenant_obligations(&self.pool, tenant_id).await?)
    }

    async fn insert_obligation(&self, new: NewObligation) -> LedgerResult<Obligation> {
        let obligation = new.into_obligation(Utc::now());
        queries::insert_obligation(&self.pool, &obligation)
            .await?
            .into_domain()
    }

    async fn ensure_rent_cycle(&self, new: NewObligation) -> LedgerResult<CycleInsert> {
        let candidate = new.into_obligation(Utc::now());
        if let Some(row) = queries::insert_rent_cycle(&self.pool, &candidate).await? {
            return Ok(CycleInsert::Created(row.into_domain()?));
        }

        let existing =
            queries::find_rent_cycle(&self.pool, candidate.tenant_id, candidate.billing_period())
                .await?
                .ok_or_else(|| {
                    LedgerError::Persistence(format!(
                        "rent cycle for tenant {} in {} conflicted but could not be read",
                        candidate.tenant_id,
                        candidate.billing_period()
                    ))
                })?;
        Ok(CycleInsert::Existing(existing.into_domain()?))
    }

    async fn record_submission(
        &self,
        tenant_id: Uuid,
        obligation_id: Uuid,
        external_ref: &str,
        submitted_at: DateTime<Utc>,
    ) -> LedgerResult<SubmissionOutcome> {
        let mut tx = self.pool.begin().await?;
        let candidate = PaymentTransaction::new(external_ref.to_string(), obligation_id, submitted_at);

        let inserted = queries::insert_transaction(&mut tx, &candidate)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    LedgerError::NotFound(format!("Obligation {}", obligation_id))
                }
                other => other.into(),
            })?;
        if let Some(row) = inserted {
            tx.commit().await?;
            return Ok(SubmissionOutcome::Created(row.into_domain()?));
        }

        let (row, owner) = queries::find_transaction_with_tenant(&mut tx, external_ref)
            .await?
            .ok_or_else(|| {
                LedgerError::Persistence(format!(
                    "transaction {} conflicted but could not be read",
                    external_ref
                ))
            })?;
        tx.commit().await?;

        if owner != tenant_id {
            return Err(LedgerError::Validation(format!(
                "transaction_id: {} is already used by another tenant",
                external_ref
            )));
        }
        Ok(SubmissionOutcome::Duplicate(row.into_domain()?))
    }

    async fn find_transaction(&self, external_ref: &str) -> LedgerResult<Option<PaymentTransaction>> {
        queries::find_transaction(&self.pool, external_ref)
            .await?
            .map(PaymentTransactionRow::into_domain)
            .transpose()
    }

    async fn list_pending_transactions(&self) -> LedgerResult<Vec<PaymentTransaction>> {
        transactions(queries::list_pending_transactions(&self.pool).await?)
    }

    async fn commit_verification(&self, request: &VerificationRequest) -> LedgerResult<VerificationReceipt> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        let mut transaction = queries::lock_transaction(&mut tx, &request.external_ref)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", request.external_ref)))?
            .into_domain()?;
        if let Some(err) = transaction.already_verified() {
            return Err(err);
        }

        let tenant_id = queries::tenant_of_obligation(&mut tx, transaction.obligation_id)
            .await?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("Obligation {}", transaction.obligation_id))
            })?;

        let mut unpaid = obligations(queries::lock_unpaid_obligations(&mut tx, tenant_id).await?)?;
        if unpaid.is_empty() {
            return Err(LedgerError::NoOutstandingObligations(tenant_id.to_string()));
        }

        let paid_before: HashMap<Uuid, BigDecimal> = unpaid
            .iter()
            .map(|o| (o.id, o.amount_paid.clone()))
            .collect();
        let plan = plan_waterfall(&unpaid, transaction.obligation_id, &request.amount)?;
        let completed = apply_plan(&mut unpaid, &plan, request.verified_at)?;

        for allocation in &plan.allocations {
            let (Some(updated), Some(previous)) = (
                unpaid.iter().find(|o| o.id == allocation.obligation_id),
                paid_before.get(&allocation.obligation_id),
            ) else {
                return Err(LedgerError::Persistence(format!(
                    "allocation targets obligation {} which was not locked",
                    allocation.obligation_id
                )));
            };

            let affected = queries::update_obligation_payment(
                &mut tx,
                updated.id,
                previous,
                &updated.amount_paid,
                updated.fully_paid_at,
            )
            .await?;
            if affected != 1 {
                return Err(LedgerError::Persistence(format!(
                    "obligation {} changed while locked",
                    updated.id
                )));
            }
        }

        transaction.mark_verified(
            request.amount.clone(),
            request.verified_by.clone(),
            request.verified_at,
        )?;
        queries::mark_transaction_verified(
            &mut tx,
            transaction.id,
            &request.amount,
            &request.verified_by,
            request.verified_at,
        )
        .await?
        .ok_or_else(|| {
            LedgerError::Persistence(format!(
                "transaction {} was verified concurrently",
                request.external_ref
            ))
        })?;

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        let transaction = queries::lock_transaction(&mut tx, external_ref)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", external_ref)))?
            .into_domain()?;
        transaction.ensure_rejectable()?;

        let tenant_id = queries::tenant_of_obligation(&mut tx, transaction.obligation_id)
            .await?
            .unwrap_or_else(Uuid::nil);
        let removed = queries::delete_pending_transaction(&mut tx, transaction.id)
            .await?
            .ok_or_else(|| LedgerError::CannotReject(external_ref.to_string()))?
            .into_domain()?;

        tx.commit().await?;
        Ok((removed, tenant_id))
    }
}
