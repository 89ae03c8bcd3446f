use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lending::loans::LoanId;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepaymentId(pub Uuid);

impl RepaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RepaymentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Upi,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub const fn ordered() -> [PaymentMethod; 5] {
        [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::Upi,
            PaymentMethod::Cheque,
            PaymentMethod::Other,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
        }
    }
}

/// Append-only ledger posting. Never mutated or deleted once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repayment {
    pub id: RepaymentId,
    pub loan_id: LoanId,
    pub loan_account_number: String,
    /// 1-based append position within the loan's ledger.
    pub sequence: u64,
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub payment_method: PaymentMethod,
    pub is_late_fee: bool,
    pub recorded_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Caller request to post a repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRequest {
    pub amount: Money,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub is_late_fee: bool,
    pub recorded_by: String,
    #[serde(default)]
    pub remarks: Option<String>,
    /// Defaults to the time of posting.
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

/// One page of a loan's postings in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepaymentPage {
    pub items: Vec<Repayment>,
    /// Pass back as `after` to continue; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}
