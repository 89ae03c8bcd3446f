use super::domain::{
    ApplicationStatus, LoanApplication, LoanApplicationId, LoanTerms, ReviewOutcome,
};
use crate::lending::error::RepositoryError;

/// Storage abstraction for loan applications.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, application: LoanApplication) -> Result<LoanApplication, RepositoryError>;

    /// Record a review decision only if the stored status is still `under_review`.
    ///
    /// This is the optimistic-concurrency guard for approval and rejection:
    /// [`RepositoryError::StaleVersion`] means another reviewer got there first.
    fn record_review(
        &self,
        id: &LoanApplicationId,
        outcome: ReviewOutcome,
    ) -> Result<LoanApplication, RepositoryError>;

    /// Replace the terms only while the application is still `under_review`.
    fn update_terms(
        &self,
        id: &LoanApplicationId,
        terms: LoanTerms,
    ) -> Result<LoanApplication, RepositoryError>;

    fn fetch(&self, id: &LoanApplicationId) -> Result<Option<LoanApplication>, RepositoryError>;
    fn fetch_by_number(&self, number: &str) -> Result<Option<LoanApplication>, RepositoryError>;

    /// Oldest applications in `status` first, at most `limit`.
    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, RepositoryError>;
}
