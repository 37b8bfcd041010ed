use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::BigDecimal;
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{ObligationRow, PaymentTransactionRow, TenantProfileRow};
use crate::domain::{Obligation, PaymentTransaction};

pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

// --- Obligation Queries ---

pub async fn get_obligation(pool: &PgPool, id: Uuid) -> Result<Option<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>("SELECT * FROM obligations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn earliest_unpaid_obligation(pool: &PgPool, tenant_id: Uuid) -> Result<Option<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        SELECT * FROM obligations
        WHERE tenant_id = $1 AND NOT is_fully_paid
        ORDER BY due_date ASC, created_at ASC, id ASC
        LIMIT 1
        "#,
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_obligations(pool: &PgPool) -> Result<Vec<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        "SELECT * FROM obligations ORDER BY due_date ASC, created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_tenant_obligations(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        SELECT * FROM obligations
        WHERE tenant_id = $1
        ORDER BY due_date ASC, created_at ASC, id ASC
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_obligation(pool: &PgPool, obligation: &Obligation) -> Result<ObligationRow> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        INSERT INTO obligations (
            id, tenant_id, unit_id, label, total_amount, amount_paid, due_date, notes, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(obligation.id)
    .bind(obligation.tenant_id)
    .bind(obligation.unit_id)
    .bind(obligation.label.as_str())
    .bind(&obligation.total_amount)
    .bind(&obligation.amount_paid)
    .bind(obligation.due_date)
    .bind(&obligation.notes)
    .bind(obligation.created_at)
    .fetch_one(pool)
    .await
}

/// Inserts a rent cycle unless the tenant already has one in that billing period.
/// Returns `None` when the unique index swallowed the insert.
pub async fn insert_rent_cycle(pool: &PgPool, obligation: &Obligation) -> Result<Option<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        INSERT INTO obligations (
            id, tenant_id, unit_id, label, total_amount, amount_paid, due_date, notes, created_at
        ) VALUES ($1, $2, $3, 'rent', $4, 0, $5, $6, $7)
        ON CONFLICT (tenant_id, billing_period) WHERE label = 'rent' DO NOTHING
        RETURNING *
        "#,
    )
    .bind(obligation.id)
    .bind(obligation.tenant_id)
    .bind(obligation.unit_id)
    .bind(&obligation.total_amount)
    .bind(obligation.due_date)
    .bind(&obligation.notes)
    .bind(obligation.created_at)
    .fetch_optional(pool)
    .await
}

pub async fn find_rent_cycle(
    pool: &PgPool,
    tenant_id: Uuid,
    billing_period: NaiveDate,
) -> Result<Option<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        SELECT * FROM obligations
        WHERE tenant_id = $1 AND label = 'rent' AND billing_period = $2
        "#,
    )
    .bind(tenant_id)
    .bind(billing_period)
    .fetch_optional(pool)
    .await
}

/// Locks the tenant's unpaid obligations in due-date order, oldest first.
pub async fn lock_unpaid_obligations(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tenant_id: Uuid,
) -> Result<Vec<ObligationRow>> {
    sqlx::query_as::<_, ObligationRow>(
        r#"
        SELECT * FROM obligations
        WHERE tenant_id = $1 AND NOT is_fully_paid
        ORDER BY due_date ASC, created_at ASC, id ASC
        FOR UPDATE
        "#,
    )
    .bind(tenant_id)
    .fetch_all(&mut **executor)
    .await
}

pub async fn tenant_of_obligation(
    executor: &mut SqlxTransaction<'_, Postgres>,
    obligation_id: Uuid,
) -> Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT tenant_id FROM obligations WHERE id = $1")
        .bind(obligation_id)
        .fetch_optional(&mut **executor)
        .await
}

/// Writes a new amount paid, guarded on the value that was read under lock.
pub async fn update_obligation_payment(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    previous_amount_paid: &BigDecimal,
    amount_paid: &BigDecimal,
    fully_paid_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE obligations
        SET amount_paid = $3,
            fully_paid_at = COALESCE(fully_paid_at, $4)
        WHERE id = $1 AND amount_paid = $2
        "#,
    )
    .bind(id)
    .bind(previous_amount_paid)
    .bind(amount_paid)
    .bind(fully_paid_at)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

// --- Payment Transaction Queries ---

pub async fn find_transaction(pool: &PgPool, external_ref: &str) -> Result<Option<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        "SELECT * FROM payment_transactions WHERE external_ref = $1",
    )
    .bind(external_ref)
    .fetch_optional(pool)
    .await
}

pub async fn lock_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    external_ref: &str,
) -> Result<Option<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        "SELECT * FROM payment_transactions WHERE external_ref = $1 FOR UPDATE",
    )
    .bind(external_ref)
    .fetch_optional(&mut **executor)
    .await
}

/// Inserts a pending claim. Returns `None` when the reference already exists.
pub async fn insert_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &PaymentTransaction,
) -> Result<Option<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        r#"
        INSERT INTO payment_transactions (
            id, external_ref, obligation_id, submitted_at, notes
        ) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (external_ref) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(&tx.external_ref)
    .bind(tx.obligation_id)
    .bind(tx.submitted_at)
    .bind(&tx.notes)
    .fetch_optional(&mut **executor)
    .await
}

/// Existing claim for a reference along with the tenant that owns it.
pub async fn find_transaction_with_tenant(
    executor: &mut SqlxTransaction<'_, Postgres>,
    external_ref: &str,
) -> Result<Option<(PaymentTransactionRow, Uuid)>> {
    let Some(row) = sqlx::query_as::<_, PaymentTransactionRow>(
        "SELECT * FROM payment_transactions WHERE external_ref = $1",
    )
    .bind(external_ref)
    .fetch_optional(&mut **executor)
    .await?
    else {
        return Ok(None);
    };

    let tenant_id = tenant_of_obligation(executor, row.obligation_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(Some((row, tenant_id)))
}

pub async fn mark_transaction_verified(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    amount: &BigDecimal,
    verified_by: &str,
    verified_at: DateTime<Utc>,
) -> Result<Option<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        r#"
        UPDATE payment_transactions
        SET amount = $2, verified_by = $3, verified_at = $4
        WHERE id = $1 AND verified_at IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(amount)
    .bind(verified_by)
    .bind(verified_at)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn list_pending_transactions(pool: &PgPool) -> Result<Vec<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        r#"
        SELECT * FROM payment_transactions
        WHERE verified_at IS NULL
        ORDER BY submitted_at ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn delete_pending_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<PaymentTransactionRow>> {
    sqlx::query_as::<_, PaymentTransactionRow>(
        "DELETE FROM payment_transactions WHERE id = $1 AND verified_at IS NULL RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut **executor)
    .await
}

// --- Directory Queries ---

pub async fn find_tenant_profile(pool: &PgPool, tenant_id: Uuid) -> Result<Option<TenantProfileRow>> {
    sqlx::query_as::<_, TenantProfileRow>(
        r#"
        SELECT t.id AS tenant_id, t.unit_id, t.move_in_date, u.monthly_rent, u.billing_day
        FROM tenants t
        JOIN units u ON u.id = t.unit_id
        WHERE t.id = $1
        "#,
    )
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
}
