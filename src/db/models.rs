//! Row types for SQLx. Converted into domain types at the adapter boundary.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{Obligation, PaymentTransaction, VerificationState};
use crate::error::{LedgerError, LedgerResult};
use crate::ports::TenantProfile;

#[derive(Debug, FromRow)]
pub struct ObligationRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub label: String,
    pub total_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub fully_paid_at: Option<DateTime<Utc>>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ObligationRow {
    pub fn into_domain(self) -> LedgerResult<Obligation> {
        Ok(Obligation {
            id: self.id,
            tenant_id: self.tenant_id,
            unit_id: self.unit_id,
            label: self.label.parse()?,
            total_amount: self.total_amount,
            amount_paid: self.amount_paid,
            due_date: self.due_date,
            fully_paid_at: self.fully_paid_at,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PaymentTransactionRow {
    pub id: Uuid,
    pub external_ref: String,
    pub obligation_id: Uuid,
    pub amount: Option<BigDecimal>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl PaymentTransactionRow {
    pub fn into_domain(self) -> LedgerResult<PaymentTransaction> {
        let state = match (self.amount, self.verified_at, self.verified_by) {
            (None, None, None) => VerificationState::Pending,
            (Some(amount), Some(verified_at), Some(verified_by)) => VerificationState::Verified {
                amount,
                verified_by,
                verified_at,
            },
            _ => {
                return Err(LedgerError::Persistence(format!(
                    "transaction {} has a partially recorded verification",
                    self.external_ref
                )))
            }
        };

        Ok(PaymentTransaction {
            id: self.id,
            external_ref: self.external_ref,
            obligation_id: self.obligation_id,
            submitted_at: self.submitted_at,
            notes: self.notes,
            state,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TenantProfileRow {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub move_in_date: NaiveDate,
    pub monthly_rent: BigDecimal,
    pub billing_day: i16,
}

impl TenantProfileRow {
    pub fn into_domain(self) -> LedgerResult<TenantProfile> {
        let billing_day = u32::try_from(self.billing_day).map_err(|_| {
            LedgerError::Persistence(format!(
                "unit {} has invalid billing_day {}",
                self.unit_id, self.billing_day
            ))
        })?;

        Ok(TenantProfile {
            tenant_id: self.tenant_id,
            unit_id: self.unit_id,
            move_in_date: self.move_in_date,
            monthly_rent: self.monthly_rent,
            billing_day,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(amount: Option<i64>, verified: bool, by: Option<&str>) -> PaymentTransactionRow {
        PaymentTransactionRow {
            id: Uuid::new_v4(),
            external_ref: "TXN1".to_string(),
            obligation_id: Uuid::new_v4(),
            amount: amount.map(BigDecimal::from),
            verified_at: verified.then(Utc::now),
            verified_by: by.map(str::to_string),
            submitted_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn maps_pending_and_verified_rows() {
        assert!(!row(None, false, None).into_domain().unwrap().is_verified());
        let verified = row(Some(100), true, Some("admin")).into_domain().unwrap();
        assert_eq!(verified.verified_amount(), Some(&BigDecimal::from(100)));
    }

    #[test]
    fn rejects_partial_verification() {
        assert!(row(Some(100), false, None).into_domain().is_err());
        assert!(row(None, true, Some("admin")).into_domain().is_err());
    }

    #[test]
    fn rejects_unknown_label() {
        let row = ObligationRow {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            label: "parking".to_string(),
            total_amount: BigDecimal::from(10),
            amount_paid: BigDecimal::from(0),
            fully_paid_at: None,
            due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            notes: None,
            created_at: Utc::now(),
        };
        assert!(row.into_domain().is_err());
    }
}
