use std::sync::Arc;

use chrono::Utc;

use super::domain::{Loan, LoanId, LoanStatus, LoanSummary};
use super::repository::LoanRepository;
use crate::identifier::IdentifierKind;
use crate::lending::applications::LoanApplication;
use crate::lending::collaborators::{dispatch, LifecycleEvent, Notification, Notifier};
use crate::lending::error::{EngineError, RepositoryError};
use crate::lending::lifecycle::Lifecycle;
use crate::lending::membership::MembershipId;
use crate::lending::retry::ReadRetryPolicy;
use crate::money::Money;
use crate::sequence::SequenceStore;

const SUMMARY_PAGE: usize = 500;

/// Funded-loan lifecycle. Loans are only ever opened by application approval.
pub struct LoanService {
    sequences: Arc<dyn SequenceStore>,
    repository: Arc<dyn LoanRepository>,
    notifier: Arc<dyn Notifier>,
    reads: ReadRetryPolicy,
    initial_status: LoanStatus,
    max_conflict_retries: u32,
}

impl LoanService {
    pub fn new(
        sequences: Arc<dyn SequenceStore>,
        repository: Arc<dyn LoanRepository>,
        notifier: Arc<dyn Notifier>,
        reads: ReadRetryPolicy,
        auto_approve: bool,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            sequences,
            repository,
            notifier,
            reads,
            initial_status: if auto_approve {
                LoanStatus::Approved
            } else {
                LoanStatus::Pending
            },
            max_conflict_retries,
        }
    }

    /// Issue a loan account number and store a loan mirroring the application's terms.
    pub(crate) fn open_for(&self, application: &LoanApplication) -> Result<Loan, EngineError> {
        let kind = IdentifierKind::Loan;
        let value = self.sequences.next(kind.sequence_name())?;
        let loan_account_number = kind.format(value)?;

        let loan = Loan {
            id: LoanId::new(),
            loan_account_number,
            membership_id: application.membership_id,
            membership_display_id: application.membership_display_id.clone(),
            originating_application: application.id,
            application_number: application.application_number.clone(),
            principal: application.terms.requested_amount,
            tenure_days: application.terms.tenure_days,
            installment_amount: application.terms.installment_amount,
            remaining_amount: application.terms.requested_amount,
            status: self.initial_status,
            posting_count: 0,
            version: 0,
            created_at: Utc::now(),
            closed_at: None,
        };

        Ok(self.repository.insert(loan)?)
    }

    /// Remove a loan whose application never linked back to it.
    pub(crate) fn discard_orphan(&self, loan: &Loan) -> Result<(), EngineError> {
        self.repository.discard(&loan.id)?;
        tracing::warn!(
            loan = %loan.loan_account_number,
            application = %loan.application_number,
            "discarded orphaned loan"
        );
        Ok(())
    }

    pub(crate) fn announce_created(&self, loan: &Loan) {
        dispatch(
            self.notifier.as_ref(),
            Notification::new(LifecycleEvent::LoanCreated, loan.loan_account_number.clone())
                .with_detail("application", loan.application_number.clone())
                .with_detail("membership", loan.membership_display_id.clone())
                .with_detail("principal", loan.principal.to_string()),
        );
    }

    pub(crate) fn all(&self) -> Result<Vec<Loan>, EngineError> {
        Ok(self.reads.run(|| self.repository.all())?)
    }

    pub fn get(&self, id: &LoanId) -> Result<Loan, EngineError> {
        self.reads
            .run(|| self.repository.fetch(id))?
            .ok_or_else(|| EngineError::not_found("loan", id.0.to_string()))
    }

    pub fn find_by_account_number(&self, number: &str) -> Result<Loan, EngineError> {
        IdentifierKind::Loan.parse(number)?;
        self.reads
            .run(|| self.repository.fetch_by_account_number(number))?
            .ok_or_else(|| EngineError::not_found("loan", number))
    }

    pub fn for_membership(&self, membership: &MembershipId) -> Result<Vec<Loan>, EngineError> {
        Ok(self.reads.run(|| self.repository.for_membership(membership))?)
    }

    /// pending -> approved, for deployments that do not auto-approve new loans.
    pub fn approve(&self, id: &LoanId) -> Result<Loan, EngineError> {
        self.transition(id, LoanStatus::Approved)
    }

    /// Explicit approved -> active, ahead of the first repayment.
    pub fn activate(&self, id: &LoanId) -> Result<Loan, EngineError> {
        self.transition(id, LoanStatus::Active)
    }

    /// pending/approved -> rejected. Active and closed loans cannot be rejected.
    pub fn reject(&self, id: &LoanId) -> Result<Loan, EngineError> {
        self.transition(id, LoanStatus::Rejected)
    }

    /// Recompute totals from the ledger alongside the stored balance.
    pub fn summary(&self, id: &LoanId) -> Result<LoanSummary, EngineError> {
        let loan = self.get(id)?;
        let mut total_repaid = Money::ZERO;
        let mut total_late_fees = Money::ZERO;
        let mut postings = 0;
        let mut after = None;

        loop {
            let page = self
                .reads
                .run(|| self.repository.postings(id, after, SUMMARY_PAGE))?;
            for posting in &page {
                postings += 1;
                if posting.is_late_fee {
                    total_late_fees += posting.amount;
                } else {
                    total_repaid += posting.amount;
                }
            }
            match page.last() {
                Some(last) if page.len() == SUMMARY_PAGE => after = Some(last.sequence),
                _ => break,
            }
        }

        if loan.principal - total_repaid != loan.remaining_amount {
            tracing::error!(
                loan = %loan.loan_account_number,
                remaining = %loan.remaining_amount,
                total_repaid = %total_repaid,
                "loan balance disagrees with ledger"
            );
        }

        Ok(LoanSummary {
            loan_account_number: loan.loan_account_number,
            status: loan.status,
            principal: loan.principal,
            remaining_amount: loan.remaining_amount,
            total_repaid,
            total_late_fees,
            postings,
        })
    }

    fn transition(&self, id: &LoanId, target: LoanStatus) -> Result<Loan, EngineError> {
        let mut attempt = 0;
        loop {
            let loan = self.get(id)?;
            loan.status.transition(target)?;

            match self.repository.update_status(id, loan.version, target) {
                Ok(updated) => {
                    tracing::info!(
                        loan = %updated.loan_account_number,
                        from = loan.status.label(),
                        to = target.label(),
                        "loan status changed"
                    );
                    return Ok(updated);
                }
                Err(RepositoryError::StaleVersion) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        loan = %loan.loan_account_number,
                        attempt,
                        "loan changed concurrently, re-reading"
                    );
                }
                Err(RepositoryError::StaleVersion) => {
                    return Err(EngineError::StoreUnavailable(format!(
                        "loan {} is under heavy contention",
                        loan.loan_account_number
                    )))
                }
                Err(RepositoryError::NotFound) => {
                    return Err(EngineError::not_found("loan", id.0.to_string()))
                }
                Err(other) => return Err(other.into()),
            }
        }
    }
}
