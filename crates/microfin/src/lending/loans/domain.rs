use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lending::applications::LoanApplicationId;
use crate::lending::lifecycle::Lifecycle;
use crate::lending::membership::MembershipId;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Closed,
    Rejected,
}

impl LoanStatus {
    /// Statuses that accept repayment postings.
    pub const fn accepts_repayments(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Active)
    }
}

impl Lifecycle for LoanStatus {
    const ENTITY: &'static str = "loan";
    const TRANSITIONS: &'static [(Self, Self)] = &[
        (LoanStatus::Pending, LoanStatus::Approved),
        (LoanStatus::Approved, LoanStatus::Active),
        (LoanStatus::Active, LoanStatus::Closed),
        (LoanStatus::Pending, LoanStatus::Rejected),
        (LoanStatus::Approved, LoanStatus::Rejected),
    ];

    fn label(self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Closed => "closed",
            LoanStatus::Rejected => "rejected",
        }
    }
}

/// A funded loan created from exactly one approved application.
///
/// `remaining_amount` only moves through ledger postings. `version` increments on every write
/// and backs the compare-and-set used by status changes and postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub loan_account_number: String,
    pub membership_id: MembershipId,
    pub membership_display_id: String,
    pub originating_application: LoanApplicationId,
    pub application_number: String,
    pub principal: Money,
    pub tenure_days: u32,
    pub installment_amount: Money,
    pub remaining_amount: Money,
    pub status: LoanStatus,
    pub posting_count: u64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Balance-level view of a loan derived from its postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanSummary {
    pub loan_account_number: String,
    pub status: LoanStatus,
    pub principal: Money,
    pub remaining_amount: Money,
    pub total_repaid: Money,
    pub total_late_fees: Money,
    pub postings: u64,
}
