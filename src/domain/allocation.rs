//! Waterfall allocation of one verified payment across a tenant's unpaid obligations.
//!
//! The planner is pure; both storage adapters call it while they hold the
//! rows they are about to update, so the algorithm lives in one place.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::min;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::obligation::Obligation;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Allocation {
    pub obligation_id: Uuid,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    /// One entry per touched obligation, in the order they were paid.
    pub allocations: Vec<Allocation>,
    /// Portion of the payment pushed onto the last obligation beyond its total.
    pub overpayment: BigDecimal,
}

impl AllocationPlan {
    pub fn total(&self) -> BigDecimal {
        self.allocations
            .iter()
            .fold(BigDecimal::from(0), |acc, a| acc + &a.amount)
    }

    pub fn has_overpayment(&self) -> bool {
        self.overpayment > BigDecimal::from(0)
    }
}

/// Plans how `amount` is spread over `unpaid`.
///
/// `unpaid` must hold only the tenant's not-fully-paid obligations, oldest due
/// date first. Allocation starts at `linked_obligation_id`, or at the oldest
/// unpaid obligation when the linked one is no longer open, and walks forward.
/// Anything left after the newest obligation is deposited onto it.
pub fn plan_waterfall(
    unpaid: &[Obligation],
    linked_obligation_id: Uuid,
    amount: &BigDecimal,
) -> LedgerResult<AllocationPlan> {
    let zero = BigDecimal::from(0);
    if amount <= &zero {
        return Err(LedgerError::Validation(
            "amount: must be greater than zero".to_string(),
        ));
    }

    let Some(last) = unpaid.last() else {
        return Err(LedgerError::NoOutstandingObligations(
            "no unpaid obligations to allocate against".to_string(),
        ));
    };

    let start = unpaid
        .iter()
        .position(|o| o.id == linked_obligation_id)
        .unwrap_or(0);

    let mut remaining = amount.clone();
    let mut allocations: Vec<Allocation> = Vec::new();

    for obligation in &unpaid[start..] {
        if remaining <= zero {
            break;
        }
        let balance = obligation.remaining_balance();
        if balance <= zero {
            continue;
        }
        let applied = min(remaining.clone(), balance);
        remaining = &remaining - &applied;
        allocations.push(Allocation {
            obligation_id: obligation.id,
            amount: applied,
        });
    }

    let overpayment = if remaining > zero {
        match allocations.iter_mut().find(|a| a.obligation_id == last.id) {
            Some(existing) => existing.amount = &existing.amount + &remaining,
            None => allocations.push(Allocation {
                obligation_id: last.id,
                amount: remaining.clone(),
            }),
        }
        remaining
    } else {
        zero
    };

    Ok(AllocationPlan {
        allocations,
        overpayment,
    })
}

/// Applies a plan to the loaded obligations and returns the ones that just
/// became fully paid.
pub fn apply_plan(
    obligations: &mut [Obligation],
    plan: &AllocationPlan,
    at: DateTime<Utc>,
) -> LedgerResult<Vec<Obligation>> {
    let mut completed = Vec::new();
    for allocation in &plan.allocations {
        let obligation = obligations
            .iter_mut()
            .find(|o| o.id == allocation.obligation_id)
            .ok_or_else(|| {
                LedgerError::Persistence(format!(
                    "allocation targets obligation {} which was not loaded",
                    allocation.obligation_id
                ))
            })?;
        if obligation.apply_payment(&allocation.amount, at)? {
            completed.push(obligation.clone());
        }
    }
    Ok(completed)
}
