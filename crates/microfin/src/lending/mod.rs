//! Membership onboarding, loan origination, repayment posting, and collection reporting.
//!
//! Services are synchronous and backend-agnostic: they talk to storage through the repository
//! traits and never hold a lock across calls. Concurrency safety comes from the conditional
//! writes those traits expose (status-guarded updates and version compare-and-set).

pub mod applications;
pub mod collaborators;
mod desk;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod loans;
pub mod membership;
pub mod memory;
pub mod report;
pub mod retry;
pub mod router;

#[cfg(test)]
mod tests;

pub use applications::{
    ApplicationStatus, ApprovedApplication, LoanApplication, LoanApplicationId,
    LoanApplicationService, LoanApplicationSubmission, LoanTerms, OrphanReport,
};
pub use collaborators::{
    DocumentRef, DocumentStore, InMemoryDocumentStore, InMemoryNotifier, LifecycleEvent,
    LogNotifier, Notification, Notifier,
};
pub use desk::{DeskStores, LendingDesk};
pub use error::{EngineError, RepositoryError, ValidationError};
pub use ledger::{PaymentMethod, Repayment, RepaymentLedger, RepaymentPage, RepaymentRequest};
pub use lifecycle::{InvalidTransition, Lifecycle};
pub use loans::{Loan, LoanId, LoanService, LoanStatus, LoanSummary};
pub use membership::{
    Membership, MembershipId, MembershipService, MembershipStatus, MembershipSubmission,
    MembershipUpdate,
};
pub use report::{DailyCollections, ReportAggregator};
pub use retry::ReadRetryPolicy;
pub use router::lending_router;
