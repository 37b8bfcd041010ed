//! Billing obligations: one row per charge or billing cycle owed by a tenant.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::billing;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObligationLabel {
    Rent,
    WaterBill,
    PowerBill,
    Maintenance,
    Other,
}

impl ObligationLabel {
    pub const ALL: [ObligationLabel; 5] = [
        ObligationLabel::Rent,
        ObligationLabel::WaterBill,
        ObligationLabel::PowerBill,
        ObligationLabel::Maintenance,
        ObligationLabel::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationLabel::Rent => "rent",
            ObligationLabel::WaterBill => "water_bill",
            ObligationLabel::PowerBill => "power_bill",
            ObligationLabel::Maintenance => "maintenance",
            ObligationLabel::Other => "other",
        }
    }

    /// Only rent renews itself when a cycle is paid off.
    pub fn is_recurring(&self) -> bool {
        matches!(self, ObligationLabel::Rent)
    }
}

impl fmt::Display for ObligationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObligationLabel {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == normalized)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|l| l.as_str()).collect();
                LedgerError::Validation(format!("label must be one of: {}", allowed.join(", ")))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    Paid,
    Pending,
    Overdue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub label: ObligationLabel,
    pub total_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub due_date: NaiveDate,
    pub fully_paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Obligation {
    pub fn remaining_balance(&self) -> BigDecimal {
        &self.total_amount - &self.amount_paid
    }

    pub fn is_fully_paid(&self) -> bool {
        self.remaining_balance() <= BigDecimal::from(0)
    }

    pub fn billing_period(&self) -> NaiveDate {
        billing::billing_period_start(self.due_date)
    }

    pub fn status_on(&self, today: NaiveDate) -> ObligationStatus {
        if self.is_fully_paid() {
            ObligationStatus::Paid
        } else if today > self.due_date {
            ObligationStatus::Overdue
        } else {
            ObligationStatus::Pending
        }
    }

    /// Adds `delta` to the amount paid. Returns `true` when this payment is the
    /// one that completed the obligation.
    pub fn apply_payment(&mut self, delta: &BigDecimal, at: DateTime<Utc>) -> LedgerResult<bool> {
        if delta <= &BigDecimal::from(0) {
            return Err(LedgerError::Validation(format!(
                "payment applied to obligation {} must be positive, got {}",
                self.id, delta
            )));
        }

        let was_paid = self.is_fully_paid();
        self.amount_paid = &self.amount_paid + delta;

        if self.is_fully_paid() && self.fully_paid_at.is_none() {
            self.fully_paid_at = Some(at);
        }

        Ok(!was_paid && self.is_fully_paid())
    }
}

/// Fields needed to open a new obligation. Money starts unpaid.
#[derive(Debug, Clone)]
pub struct NewObligation {
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub label: ObligationLabel,
    pub total_amount: BigDecimal,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

impl NewObligation {
    pub fn into_obligation(self, created_at: DateTime<Utc>) -> Obligation {
        Obligation {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            unit_id: self.unit_id,
            label: self.label,
            total_amount: self.total_amount,
            amount_paid: BigDecimal::from(0),
            due_date: self.due_date,
            fully_paid_at: None,
            notes: self.notes,
            created_at,
        }
    }
}

/// Result of inserting a rent cycle under the one-per-period rule.
#[derive(Debug, Clone)]
pub enum CycleInsert {
    Created(Obligation),
    Existing(Obligation),
}

impl CycleInsert {
    pub fn obligation(&self) -> &Obligation {
        match self {
            CycleInsert::Created(o) | CycleInsert::Existing(o) => o,
        }
    }

    pub fn into_obligation(self) -> Obligation {
        match self {
            CycleInsert::Created(o) | CycleInsert::Existing(o) => o,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CycleInsert::Created(_))
    }
}
