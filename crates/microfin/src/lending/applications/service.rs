use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use super::domain::{
    ApplicationStatus, LoanApplication, LoanApplicationId, LoanApplicationSubmission, LoanTerms,
    ReviewOutcome,
};
use super::repository::ApplicationRepository;
use crate::identifier::IdentifierKind;
use crate::lending::collaborators::{dispatch, LifecycleEvent, Notification, Notifier};
use crate::lending::error::{EngineError, RepositoryError};
use crate::lending::lifecycle::{InvalidTransition, Lifecycle};
use crate::lending::loans::{Loan, LoanService};
use crate::lending::membership::{MembershipRepository, MembershipStatus};
use crate::lending::retry::ReadRetryPolicy;
use crate::sequence::SequenceStore;

/// Postcondition of a successful approval: the application is approved and links to `loan`,
/// and `loan` points back at the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovedApplication {
    pub application: LoanApplication,
    pub loan: Loan,
}

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    pub examined: usize,
    /// Loan account numbers removed because no approved application links to them.
    pub discarded: Vec<String>,
    /// Approved applications whose linked loan is missing. These need manual attention.
    pub dangling_applications: Vec<String>,
}

/// Intake and review of loan applications, including the approval use case that opens a loan.
pub struct LoanApplicationService {
    sequences: Arc<dyn SequenceStore>,
    repository: Arc<dyn ApplicationRepository>,
    memberships: Arc<dyn MembershipRepository>,
    loans: Arc<LoanService>,
    notifier: Arc<dyn Notifier>,
    reads: ReadRetryPolicy,
}

impl LoanApplicationService {
    pub fn new(
        sequences: Arc<dyn SequenceStore>,
        repository: Arc<dyn ApplicationRepository>,
        memberships: Arc<dyn MembershipRepository>,
        loans: Arc<LoanService>,
        notifier: Arc<dyn Notifier>,
        reads: ReadRetryPolicy,
    ) -> Self {
        Self {
            sequences,
            repository,
            memberships,
            loans,
            notifier,
            reads,
        }
    }

    /// Store a new application under review. The member must already be approved.
    pub fn submit(
        &self,
        submission: LoanApplicationSubmission,
    ) -> Result<LoanApplication, EngineError> {
        submission.validate()?;
        IdentifierKind::Membership.parse(&submission.membership)?;

        let membership = self
            .reads
            .run(|| self.memberships.fetch_by_display_id(&submission.membership))?
            .ok_or_else(|| EngineError::not_found("membership", submission.membership.clone()))?;
        if membership.status != MembershipStatus::Approved {
            return Err(EngineError::MembershipNotApproved {
                membership: membership.display_id,
                status: membership.status.label(),
            });
        }

        let kind = IdentifierKind::LoanApplication;
        let value = self.sequences.next(kind.sequence_name())?;
        let application_number = kind.format(value)?;

        let application = LoanApplication {
            id: LoanApplicationId::new(),
            application_number,
            membership_id: membership.id,
            membership_display_id: membership.display_id,
            terms: submission.terms,
            nominee: submission.nominee,
            guarantor: submission.guarantor,
            co_applicant: submission.co_applicant,
            status: ApplicationStatus::UnderReview,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            resulting_loan: None,
            created_at: Utc::now(),
        };

        let stored = self.repository.insert(application)?;
        tracing::info!(
            application = %stored.application_number,
            membership = %stored.membership_display_id,
            amount = %stored.terms.requested_amount,
            "loan application submitted"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &LoanApplicationId) -> Result<LoanApplication, EngineError> {
        self.reads
            .run(|| self.repository.fetch(id))?
            .ok_or_else(|| EngineError::not_found("loan application", id.0.to_string()))
    }

    pub fn find_by_number(&self, number: &str) -> Result<LoanApplication, EngineError> {
        IdentifierKind::LoanApplication.parse(number)?;
        self.reads
            .run(|| self.repository.fetch_by_number(number))?
            .ok_or_else(|| EngineError::not_found("loan application", number))
    }

    /// Applications awaiting review, oldest first.
    pub fn pending(&self, limit: usize) -> Result<Vec<LoanApplication>, EngineError> {
        Ok(self
            .reads
            .run(|| self.repository.by_status(ApplicationStatus::UnderReview, limit))?)
    }

    pub fn update_terms(
        &self,
        id: &LoanApplicationId,
        terms: LoanTerms,
    ) -> Result<LoanApplication, EngineError> {
        terms.validate()?;
        match self.repository.update_terms(id, terms) {
            Ok(updated) => Ok(updated),
            Err(RepositoryError::StaleVersion) => {
                let latest = self.get(id)?;
                Err(InvalidTransition {
                    entity: ApplicationStatus::ENTITY,
                    from: latest.status.label(),
                    to: "updated",
                }
                .into())
            }
            Err(RepositoryError::NotFound) => {
                Err(EngineError::not_found("loan application", id.0.to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Approve an application and open its loan as one unit.
    ///
    /// 1. the application must still be under review, else [`EngineError::AlreadyReviewed`];
    /// 2. a loan account number is issued;
    /// 3. the loan is stored pointing at the application;
    /// 4. the application is marked approved with a link to the loan, conditional on it still
    ///    being under review.
    ///
    /// If step 4 loses a race or fails, the loan from step 3 is discarded so no loan exists
    /// without an approved application linking to it. A retry after a timeout observes
    /// `AlreadyReviewed` instead of opening a second loan.
    pub fn approve(
        &self,
        id: &LoanApplicationId,
        reviewed_by: &str,
    ) -> Result<ApprovedApplication, EngineError> {
        let application = self.get(id)?;
        ensure_under_review(&application)?;

        let loan = self.loans.open_for(&application)?;

        let outcome = ReviewOutcome {
            status: ApplicationStatus::Approved,
            reviewed_by: reviewed_by.to_string(),
            reviewed_at: Utc::now(),
            rejection_reason: None,
            resulting_loan: Some(loan.id),
        };

        let approved = match self.repository.record_review(id, outcome) {
            Ok(approved) => approved,
            Err(RepositoryError::StaleVersion) => {
                self.reconcile_failed_link(&loan);
                let latest = self.get(id)?;
                return Err(already_reviewed(&latest));
            }
            Err(err) => return self.recover_unacknowledged_link(id, loan, err),
        };

        self.after_approval(&approved, &loan);
        Ok(ApprovedApplication {
            application: approved,
            loan,
        })
    }

    pub fn reject(
        &self,
        id: &LoanApplicationId,
        reviewed_by: &str,
        reason: Option<String>,
    ) -> Result<LoanApplication, EngineError> {
        let application = self.get(id)?;
        ensure_under_review(&application)?;

        let outcome = ReviewOutcome {
            status: ApplicationStatus::Rejected,
            reviewed_by: reviewed_by.to_string(),
            reviewed_at: Utc::now(),
            rejection_reason: reason,
            resulting_loan: None,
        };

        let rejected = match self.repository.record_review(id, outcome) {
            Ok(rejected) => rejected,
            Err(RepositoryError::StaleVersion) => {
                let latest = self.get(id)?;
                return Err(already_reviewed(&latest));
            }
            Err(RepositoryError::NotFound) => {
                return Err(EngineError::not_found("loan application", id.0.to_string()))
            }
            Err(other) => return Err(other.into()),
        };

        tracing::info!(
            application = %rejected.application_number,
            reviewed_by,
            "loan application rejected"
        );
        let mut notification = Notification::new(
            LifecycleEvent::ApplicationRejected,
            rejected.application_number.clone(),
        );
        if let Some(reason) = rejected.rejection_reason.as_deref() {
            notification = notification.with_detail("reason", reason);
        }
        dispatch(self.notifier.as_ref(), notification);

        Ok(rejected)
    }

    /// Maintenance sweep restoring the loan/application link invariant.
    ///
    /// Loans younger than `grace` are skipped so that approvals still between steps 3 and 4 are
    /// left alone.
    pub fn reconcile_orphans(&self, grace: Duration) -> Result<OrphanReport, EngineError> {
        let cutoff = Utc::now() - grace;
        let loans = self.loans.all()?;
        let mut report = OrphanReport {
            examined: loans.len(),
            ..OrphanReport::default()
        };
        let mut linked = HashSet::new();

        for loan in &loans {
            let application = self
                .reads
                .run(|| self.repository.fetch(&loan.originating_application))?;
            let is_linked = application.as_ref().is_some_and(|application| {
                application.status == ApplicationStatus::Approved
                    && application.resulting_loan == Some(loan.id)
            });

            if is_linked {
                linked.insert(loan.id);
            } else if loan.created_at < cutoff {
                match self.loans.discard_orphan(loan) {
                    Ok(()) => report.discarded.push(loan.loan_account_number.clone()),
                    Err(err) => tracing::error!(
                        loan = %loan.loan_account_number,
                        error = %err,
                        "orphaned loan could not be discarded"
                    ),
                }
            }
        }

        let approved = self
            .reads
            .run(|| self.repository.by_status(ApplicationStatus::Approved, usize::MAX))?;
        for application in approved {
            let has_loan = application
                .resulting_loan
                .is_some_and(|loan| linked.contains(&loan));
            if !has_loan {
                tracing::error!(
                    application = %application.application_number,
                    "approved application has no linked loan"
                );
                report.dangling_applications.push(application.application_number);
            }
        }

        Ok(report)
    }

    fn after_approval(&self, application: &LoanApplication, loan: &Loan) {
        tracing::info!(
            application = %application.application_number,
            loan = %loan.loan_account_number,
            reviewed_by = application.reviewed_by.as_deref().unwrap_or_default(),
            "loan application approved"
        );
        dispatch(
            self.notifier.as_ref(),
            Notification::new(
                LifecycleEvent::ApplicationApproved,
                application.application_number.clone(),
            )
            .with_detail("loan", loan.loan_account_number.clone()),
        );
        self.loans.announce_created(loan);
    }

    /// Step 4 failed without a definitive answer. Re-read to learn whether it committed.
    fn recover_unacknowledged_link(
        &self,
        id: &LoanApplicationId,
        loan: Loan,
        err: RepositoryError,
    ) -> Result<ApprovedApplication, EngineError> {
        match self.reads.run(|| self.repository.fetch(id)) {
            Ok(Some(application)) if application.resulting_loan == Some(loan.id) => {
                self.after_approval(&application, &loan);
                Ok(ApprovedApplication { application, loan })
            }
            Ok(Some(application)) if application.status != ApplicationStatus::UnderReview => {
                self.reconcile_failed_link(&loan);
                Err(already_reviewed(&application))
            }
            Ok(Some(_)) => {
                self.reconcile_failed_link(&loan);
                Err(err.into())
            }
            Ok(None) => {
                self.reconcile_failed_link(&loan);
                Err(EngineError::not_found("loan application", id.0.to_string()))
            }
            Err(read_err) => {
                tracing::error!(
                    loan = %loan.loan_account_number,
                    error = %read_err,
                    "approval outcome unknown; loan left for orphan reconciliation"
                );
                Err(err.into())
            }
        }
    }

    fn reconcile_failed_link(&self, loan: &Loan) {
        if let Err(err) = self.loans.discard_orphan(loan) {
            tracing::error!(
                loan = %loan.loan_account_number,
                error = %err,
                "failed to discard orphaned loan; the orphan sweep will retry"
            );
        }
    }
}

fn ensure_under_review(application: &LoanApplication) -> Result<(), EngineError> {
    if application.status == ApplicationStatus::UnderReview {
        Ok(())
    } else {
        Err(already_reviewed(application))
    }
}

fn already_reviewed(application: &LoanApplication) -> EngineError {
    EngineError::AlreadyReviewed {
        application: application.application_number.clone(),
        status: application.status.label(),
    }
}
