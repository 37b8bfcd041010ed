//! Tenant-submitted payment claims.
//!
//! A claim starts `Pending` and moves to `Verified` exactly once. The amount,
//! verifier and verification time only exist inside the `Verified` variant.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationState {
    Pending,
    Verified {
        amount: BigDecimal,
        verified_by: String,
        verified_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub external_ref: String,
    pub obligation_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub state: VerificationState,
}

impl PaymentTransaction {
    pub fn new(external_ref: String, obligation_id: Uuid, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_ref,
            obligation_id,
            submitted_at,
            notes: None,
            state: VerificationState::Pending,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self.state, VerificationState::Verified { .. })
    }

    pub fn verified_amount(&self) -> Option<&BigDecimal> {
        match &self.state {
            VerificationState::Verified { amount, .. } => Some(amount),
            VerificationState::Pending => None,
        }
    }

    /// Error describing why this claim cannot be verified again, if it is verified.
    pub fn already_verified(&self) -> Option<LedgerError> {
        match &self.state {
            VerificationState::Verified {
                amount,
                verified_at,
                ..
            } => Some(LedgerError::AlreadyVerified {
                external_ref: self.external_ref.clone(),
                amount: amount.clone(),
                verified_at: *verified_at,
            }),
            VerificationState::Pending => None,
        }
    }

    /// One-way transition from `Pending` to `Verified`.
    pub fn mark_verified(
        &mut self,
        amount: BigDecimal,
        verified_by: String,
        verified_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if let Some(err) = self.already_verified() {
            return Err(err);
        }

        self.state = VerificationState::Verified {
            amount,
            verified_by,
            verified_at,
        };
        Ok(())
    }

    pub fn ensure_rejectable(&self) -> LedgerResult<()> {
        if self.is_verified() {
            return Err(LedgerError::CannotReject(self.external_ref.clone()));
        }
        Ok(())
    }
}

/// Outcome of recording a submission; duplicates are a successful no-op.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    Created(PaymentTransaction),
    Duplicate(PaymentTransaction),
}

impl SubmissionOutcome {
    pub fn transaction(&self) -> &PaymentTransaction {
        match self {
            SubmissionOutcome::Created(tx) | SubmissionOutcome::Duplicate(tx) => tx,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SubmissionOutcome::Duplicate(_))
    }
}
