use std::sync::Arc;

use chrono::Utc;

use super::domain::{Repayment, RepaymentId, RepaymentPage, RepaymentRequest};
use crate::lending::collaborators::{dispatch, LifecycleEvent, Notification, Notifier};
use crate::lending::error::{EngineError, RepositoryError, ValidationError};
use crate::lending::lifecycle::Lifecycle;
use crate::lending::loans::{Loan, LoanId, LoanRepository, LoanStatus, PostingCommit};
use crate::lending::retry::ReadRetryPolicy;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 500;

/// Append-only repayment postings and the loan balance they drive.
pub struct RepaymentLedger {
    loans: Arc<dyn LoanRepository>,
    notifier: Arc<dyn Notifier>,
    reads: ReadRetryPolicy,
    max_conflict_retries: u32,
}

impl RepaymentLedger {
    pub fn new(
        loans: Arc<dyn LoanRepository>,
        notifier: Arc<dyn Notifier>,
        reads: ReadRetryPolicy,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            loans,
            notifier,
            reads,
            max_conflict_retries,
        }
    }

    /// Append a posting and, unless it is a late fee, reduce the balance by its amount.
    ///
    /// The balance write is a compare-and-set on the loan version observed when the balance was
    /// read; on conflict the guards are re-evaluated against the fresh loan and the write is
    /// attempted again. A store failure is surfaced as-is, never retried.
    pub fn post_repayment(
        &self,
        loan_id: &LoanId,
        request: RepaymentRequest,
    ) -> Result<Repayment, EngineError> {
        if !request.amount.is_positive() {
            return Err(ValidationError::new("amount", "must be greater than zero").into());
        }
        if request.recorded_by.trim().is_empty() {
            return Err(ValidationError::new("recorded_by", "must not be blank").into());
        }

        let repayment_id = RepaymentId::new();
        let payment_date = request.payment_date.unwrap_or_else(Utc::now);
        let mut attempt = 0;

        loop {
            let loan = self.load(loan_id)?;
            let commit = plan_posting(&loan, &request, repayment_id, payment_date)?;
            let repayment = commit.repayment.clone();

            match self.loans.commit_posting(commit) {
                Ok(updated) => {
                    tracing::info!(
                        loan = %updated.loan_account_number,
                        sequence = repayment.sequence,
                        amount = %repayment.amount,
                        late_fee = repayment.is_late_fee,
                        remaining = %updated.remaining_amount,
                        status = updated.status.label(),
                        "repayment posted"
                    );
                    if updated.status == LoanStatus::Closed && loan.status != LoanStatus::Closed {
                        dispatch(
                            self.notifier.as_ref(),
                            Notification::new(
                                LifecycleEvent::LoanClosed,
                                updated.loan_account_number.clone(),
                            )
                            .with_detail("principal", updated.principal.to_string()),
                        );
                    }
                    return Ok(repayment);
                }
                Err(RepositoryError::StaleVersion) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::debug!(
                        loan = %loan.loan_account_number,
                        attempt,
                        "loan balance moved under us, re-reading"
                    );
                }
                Err(RepositoryError::StaleVersion) => {
                    return Err(EngineError::StoreUnavailable(format!(
                        "loan {} is under heavy contention",
                        loan.loan_account_number
                    )))
                }
                Err(RepositoryError::NotFound) => {
                    return Err(EngineError::not_found("loan", loan_id.0.to_string()))
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Postings with `sequence > after`, oldest first. Feed `next_cursor` back to continue.
    pub fn list_repayments(
        &self,
        loan_id: &LoanId,
        after: Option<u64>,
        limit: Option<usize>,
    ) -> Result<RepaymentPage, EngineError> {
        self.load(loan_id)?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let mut items = self
            .reads
            .run(|| self.loans.postings(loan_id, after, limit + 1))?;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|posting| posting.sequence)
        } else {
            None
        };

        Ok(RepaymentPage { items, next_cursor })
    }

    fn load(&self, loan_id: &LoanId) -> Result<Loan, EngineError> {
        self.reads
            .run(|| self.loans.fetch(loan_id))?
            .ok_or_else(|| EngineError::not_found("loan", loan_id.0.to_string()))
    }
}

fn plan_posting(
    loan: &Loan,
    request: &RepaymentRequest,
    repayment_id: RepaymentId,
    payment_date: chrono::DateTime<Utc>,
) -> Result<PostingCommit, EngineError> {
    if !loan.status.accepts_repayments() {
        return Err(EngineError::InvalidLoanState {
            loan: loan.loan_account_number.clone(),
            status: loan.status.label(),
        });
    }

    let mut remaining_amount = loan.remaining_amount;
    let mut status = loan.status;
    let mut closed_at = loan.closed_at;

    if !request.is_late_fee {
        remaining_amount = loan
            .remaining_amount
            .checked_sub(request.amount)
            .ok_or(EngineError::OverPayment {
                requested: request.amount,
                remaining: loan.remaining_amount,
            })?;
        if status == LoanStatus::Approved {
            status = status.transition(LoanStatus::Active)?;
        }
        if remaining_amount.is_zero() {
            status = status.transition(LoanStatus::Closed)?;
            closed_at = Some(Utc::now());
        }
    }

    Ok(PostingCommit {
        loan_id: loan.id,
        expected_version: loan.version,
        remaining_amount,
        status,
        closed_at,
        repayment: Repayment {
            id: repayment_id,
            loan_id: loan.id,
            loan_account_number: loan.loan_account_number.clone(),
            sequence: loan.posting_count + 1,
            amount: request.amount,
            payment_date,
            payment_method: request.payment_method,
            is_late_fee: request.is_late_fee,
            recorded_by: request.recorded_by.clone(),
            remarks: request.remarks.clone(),
        },
    })
}
