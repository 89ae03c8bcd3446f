use chrono::{DateTime, Utc};

use super::domain::{Loan, LoanId, LoanStatus};
use crate::lending::applications::LoanApplicationId;
use crate::lending::error::RepositoryError;
use crate::lending::ledger::Repayment;
use crate::lending::membership::MembershipId;
use crate::money::Money;

/// Balance change and posting written together in one conditional store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingCommit {
    pub loan_id: LoanId,
    /// Version observed when the balance was read; the write fails if it moved.
    pub expected_version: u64,
    pub remaining_amount: Money,
    pub status: LoanStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub repayment: Repayment,
}

/// Storage abstraction for loans and their ledger postings.
///
/// Postings live beside the loan so that appending one and adjusting the balance can be a
/// single atomic write.
pub trait LoanRepository: Send + Sync {
    /// Fails with [`RepositoryError::Conflict`] if the account number is already taken.
    fn insert(&self, loan: Loan) -> Result<Loan, RepositoryError>;

    fn fetch(&self, id: &LoanId) -> Result<Option<Loan>, RepositoryError>;
    fn fetch_by_account_number(&self, number: &str) -> Result<Option<Loan>, RepositoryError>;
    fn for_membership(&self, membership: &MembershipId) -> Result<Vec<Loan>, RepositoryError>;
    fn for_application(
        &self,
        application: &LoanApplicationId,
    ) -> Result<Vec<Loan>, RepositoryError>;
    fn all(&self) -> Result<Vec<Loan>, RepositoryError>;

    /// Compare-and-set on `version`; returns the stored loan with its bumped version.
    fn update_status(
        &self,
        id: &LoanId,
        expected_version: u64,
        status: LoanStatus,
    ) -> Result<Loan, RepositoryError>;

    /// Compare-and-set on `version` that appends the posting and writes the new balance.
    fn commit_posting(&self, commit: PostingCommit) -> Result<Loan, RepositoryError>;

    /// Remove a loan that never received postings. Used only for orphan reconciliation.
    fn discard(&self, id: &LoanId) -> Result<(), RepositoryError>;

    /// Postings for one loan with `sequence > after`, in append order.
    fn postings(
        &self,
        id: &LoanId,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Repayment>, RepositoryError>;

    /// Every posting with `from <= payment_date < to`, across all loans.
    fn postings_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Repayment>, RepositoryError>;
}
